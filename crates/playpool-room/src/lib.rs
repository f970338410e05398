//! Rooms for playpool.
//!
//! A room is a capacity-bounded broadcast domain. Each one runs as an
//! isolated Tokio task (actor model) that alone owns its member list and
//! applies every admission, departure, score update and fan-out in the
//! order they reach its queue. Rooms are independent of one another.
//!
//! # Key types
//!
//! - [`Directory`] — owns the rooms, places new connections first-fit
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomConfig`] — capacity, queue bound, send timeout
//! - [`RoomInfo`] / [`MemberSnapshot`] — read-only views of a room

mod config;
mod directory;
mod error;
mod fanout;
mod room;
mod roster;

pub use config::RoomConfig;
pub use directory::{Directory, Placement};
pub use error::RoomError;
pub use room::{MemberSnapshot, RoomHandle, RoomInfo};
