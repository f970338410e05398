//! In-process duplex transport built on Tokio channels.
//!
//! [`pair`] hands back the two ends of one connection: the
//! [`MemoryConnection`] is what the server side drives through the
//! [`Connection`] trait, and the [`MemoryPeer`] plays the client.
//!
//! The server-to-client direction is bounded. A peer that stops reading
//! makes server sends block once `capacity` frames are buffered, which is
//! how a stalled client looks to the room layer.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, ConnectionId, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Creates a connected server/client pair.
///
/// `capacity` bounds the frames buffered towards the client (minimum 1).
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryPeer) {
    let (to_client, from_server) = mpsc::channel(capacity.max(1));
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);

    let id = ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed));

    let server = MemoryConnection {
        id,
        outbound: to_client,
        inbound: Mutex::new(from_client),
        closed: closed_tx,
    };
    let client = MemoryPeer {
        id,
        outbound: Some(to_server),
        inbound: from_server,
        closed: closed_rx,
    };
    (server, client)
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

impl MemoryConnection {
    /// Returns `true` once [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        self.outbound
            .send(data.to_vec())
            .await
            .map_err(|_| TransportError::ConnectionClosed(self.id.to_string()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        let already_closed = *closed.borrow_and_update();
        if already_closed {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => Ok(frame),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Client side of an in-memory connection.
pub struct MemoryPeer {
    id: ConnectionId,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    inbound: mpsc::Receiver<Vec<u8>>,
    closed: watch::Receiver<bool>,
}

impl MemoryPeer {
    /// The id shared with the server side of this pair.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends a frame to the server.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        let closed = || TransportError::ConnectionClosed(self.id.to_string());
        if *self.closed.borrow() {
            return Err(closed());
        }
        match &self.outbound {
            Some(tx) => tx.send(data.into()).map_err(|_| closed()),
            None => Err(closed()),
        }
    }

    /// Receives the next frame from the server.
    ///
    /// Frames already buffered are delivered before a server-side close is
    /// reported as `None`.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        if let Ok(frame) = self.inbound.try_recv() {
            return Some(frame);
        }
        if *self.closed.borrow_and_update() {
            return None;
        }
        tokio::select! {
            biased;
            frame = self.inbound.recv() => return frame,
            _ = self.closed.changed() => {}
        }
        self.inbound.try_recv().ok()
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout`.
    pub async fn recv_timeout(
        &mut self,
        timeout: std::time::Duration,
    ) -> Option<Vec<u8>> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Hangs up from the client side. The server observes `recv() == None`.
    pub fn close(&mut self) {
        self.outbound = None;
    }

    /// Returns `true` once the server side has closed the connection.
    pub fn is_closed_by_server(&self) -> bool {
        *self.closed.borrow()
    }
}
