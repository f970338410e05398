//! The session type: one connected client and its transport.
//!
//! A session is owned by exactly one room. The room uses it to push
//! envelopes out; the session's reader task pushes the client's own
//! notifications back into the room's queue.

use std::sync::Arc;
use std::time::Duration;

use playpool_protocol::{Codec, Envelope, MemberId};
use playpool_transport::{Connection, ConnectionId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::reader::read_loop;
use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Per-session limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a single outbound send may take before the session is
    /// considered dead.
    ///
    /// Default: 5 seconds.
    pub send_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected client.
///
/// The connection sits behind an `Arc` because two tasks use it: the
/// reader task (blocked in `recv`) and the room actor (calling `send`).
pub struct Session<C: Connection, K: Codec> {
    member_id: MemberId,
    connection: Arc<C>,
    codec: K,
    config: SessionConfig,
}

impl<C: Connection, K: Codec> Session<C, K> {
    /// Wraps an accepted connection for the member `member_id`.
    pub fn new(
        member_id: MemberId,
        connection: Arc<C>,
        codec: K,
        config: SessionConfig,
    ) -> Self {
        Self {
            member_id,
            connection,
            codec,
            config,
        }
    }

    /// The member this session belongs to.
    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    /// The transport-level id of the underlying connection.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Encodes `envelope` and writes it to the client.
    ///
    /// # Errors
    /// - [`SessionError::Protocol`] if the envelope can't be encoded
    /// - [`SessionError::Transport`] if the write fails
    /// - [`SessionError::SendTimeout`] if the write doesn't finish within
    ///   `send_timeout` (a client that stopped reading)
    ///
    /// Every error is terminal: the caller should treat the member as gone.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let bytes = self.codec.encode(envelope)?;
        match tokio::time::timeout(
            self.config.send_timeout,
            self.connection.send(&bytes),
        )
        .await
        {
            Ok(result) => result.map_err(SessionError::Transport),
            Err(_) => Err(SessionError::SendTimeout(self.config.send_timeout)),
        }
    }

    /// Closes the underlying transport. Safe to call more than once.
    ///
    /// Bounded by `send_timeout` like [`send`](Self::send): a graceful close
    /// has to flush a close frame, and a client that stopped reading never
    /// lets it through.
    ///
    /// # Errors
    /// - [`SessionError::Transport`] if the transport refuses the close
    /// - [`SessionError::CloseTimeout`] if the flush doesn't finish in time
    pub async fn close(&self) -> Result<(), SessionError> {
        match tokio::time::timeout(self.config.send_timeout, self.connection.close())
            .await
        {
            Ok(result) => result.map_err(SessionError::Transport),
            Err(_) => Err(SessionError::CloseTimeout(self.config.send_timeout)),
        }
    }

    /// Starts the inbound reader on its own task.
    ///
    /// Every frame the client sends becomes an [`Envelope`] tagged with
    /// this session's member id and pushed into `events`. The reader stops
    /// after forwarding a `Left`, or when `events` is closed.
    pub fn spawn_reader<T>(&self, events: mpsc::Sender<T>) -> JoinHandle<()>
    where
        T: From<Envelope> + Send + 'static,
    {
        tokio::spawn(read_loop(
            Arc::clone(&self.connection),
            self.codec.clone(),
            self.member_id,
            events,
        ))
    }
}

impl<C: Connection, K: Codec> std::fmt::Debug for Session<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("member_id", &self.member_id)
            .field("connection_id", &self.connection.id())
            .finish()
    }
}
