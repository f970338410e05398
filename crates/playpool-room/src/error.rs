//! Error types for the room layer.

use playpool_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room is at capacity. Not a failure: the directory moves on to
    /// the next room.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room's actor is gone or shutting down.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
