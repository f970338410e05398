//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! TCP accepts run on a background task and every upgrade handshake runs on
//! its own task under a timeout, so a client that connects and never sends
//! its upgrade request costs one idle task, not the whole listener.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upgraded connections waiting for [`Transport::accept`].
const READY_BACKLOG: usize = 128;

/// Default limit on how long a client may take to complete its upgrade.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Listening starts on the first [`accept`](Transport::accept); until then
/// the path filter and handshake timeout can still be changed.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    path: Option<String>,
    handshake_timeout: Duration,
    listener: Option<TcpListener>,
    ready: Option<mpsc::Receiver<WebSocketConnection>>,
    acceptor: Option<JoinHandle<()>>,
    shut_down: AtomicBool,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    ///
    /// Upgrades on any request path until [`with_path`](Self::with_path)
    /// restricts it.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");
        Ok(Self {
            local_addr,
            path: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            listener: Some(listener),
            ready: None,
            acceptor: None,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Only upgrade requests whose path equals `path`; others get a 404.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Drops clients that have not finished the upgrade within `timeout`.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    fn start(&mut self, listener: TcpListener) {
        let (tx, rx) = mpsc::channel(READY_BACKLOG);
        self.ready = Some(rx);
        self.acceptor = Some(tokio::spawn(accept_loop(
            listener,
            self.path.clone(),
            self.handshake_timeout,
            tx,
        )));
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        if let Some(listener) = self.listener.take() {
            self.start(listener);
        }
        let ready = self.ready.as_mut().ok_or(TransportError::Shutdown)?;
        ready.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(acceptor) = &self.acceptor {
            acceptor.abort();
        }
        tracing::info!(local_addr = %self.local_addr, "WebSocket transport stopped");
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(acceptor) = &self.acceptor {
            acceptor.abort();
        }
    }
}

/// Accepts TCP connections and hands each one to its own handshake task.
async fn accept_loop(
    listener: TcpListener,
    path: Option<String>,
    handshake_timeout: Duration,
    ready: mpsc::Sender<WebSocketConnection>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept failed");
                // Out of descriptors and the like; don't spin.
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        if ready.is_closed() {
            break;
        }

        let path = path.clone();
        let ready = ready.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(handshake_timeout, upgrade(stream, path)).await {
                Ok(Ok(conn)) => {
                    tracing::debug!(id = %conn.id, %addr, "accepted WebSocket connection");
                    if ready.send(conn).await.is_err() {
                        tracing::debug!(%addr, "transport stopped, dropping connection");
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "WebSocket handshake failed");
                }
                Err(_) => {
                    tracing::debug!(%addr, ?handshake_timeout, "WebSocket handshake timed out");
                }
            }
        });
    }
}

/// Runs the upgrade handshake, refusing paths other than `path`.
async fn upgrade(
    stream: TcpStream,
    path: Option<String>,
) -> Result<WebSocketConnection, TransportError> {
    let check_path = move |req: &Request, resp: Response| match &path {
        Some(path) if req.uri().path() != path => {
            let mut refused: ErrorResponse =
                ErrorResponse::new(Some("no such endpoint".into()));
            *refused.status_mut() = StatusCode::NOT_FOUND;
            Err(refused)
        }
        _ => Ok(resp),
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, check_path)
        .await
        .map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
        closed: AtomicBool::new(false),
    })
}

/// A single WebSocket connection.
///
/// The socket is split so the reader task can sit in `recv` while a room
/// actor sends on the same connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: AtomicBool,
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
