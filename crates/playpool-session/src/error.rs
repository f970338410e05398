//! Error types for the session layer.

use std::time::Duration;

use playpool_protocol::ProtocolError;
use playpool_transport::TransportError;

/// Errors raised while talking to one client.
///
/// All of them end the session. The room turns any of them into a
/// departure for that member.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport refused a send, receive, or close.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The client did not take a frame within the send timeout.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// The transport did not finish closing within the send timeout. The
    /// socket is released when the session is dropped.
    #[error("close timed out after {0:?}")]
    CloseTimeout(Duration),
}
