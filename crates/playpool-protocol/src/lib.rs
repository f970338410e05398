//! Wire protocol for playpool.
//!
//! This crate defines what clients and rooms exchange:
//!
//! - **Types** ([`Envelope`], [`EventKind`], [`ClientNotification`],
//!   [`MemberId`], [`RoomId`]) — the structures that travel on the wire
//!   and through room event queues.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   become frames.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session → Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, MAX_FRAME_LEN};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientNotification, Envelope, EventKind, MemberId, RoomId};
