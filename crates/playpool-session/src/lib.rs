//! Client sessions for playpool.
//!
//! A [`Session`] bridges one transport connection to the room that owns it:
//!
//! 1. **Outbound** — [`Session::send`] encodes an envelope and writes it,
//!    bounded by a timeout so a stalled client can't stall its room.
//! 2. **Inbound** — [`Session::spawn_reader`] runs the read loop that turns
//!    client frames (and transport failures) into envelopes on the room's
//!    queue.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← owns sessions, decides who gets what
//!     ↕
//! Session Layer (this crate)  ← one client, one connection
//!     ↕
//! Transport + Protocol (below)  ← frames and envelopes
//! ```

mod error;
mod reader;
mod session;

pub use error::SessionError;
pub use session::{Session, SessionConfig};
