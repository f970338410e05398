//! Unified error type for playpool.

use playpool_protocol::ProtocolError;
use playpool_room::RoomError;
use playpool_session::SessionError;
use playpool_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlaypoolError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (send timeout, closed peer).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, actor gone).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
