//! `PlaypoolServer` builder and server loop.
//!
//! This is the entry point for running a relay. It ties together all the
//! layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use playpool_protocol::JsonCodec;
use playpool_room::Directory;
use playpool_transport::{
    Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport,
};

use crate::{PlaypoolError, ServerConfig};

/// The directory type the WebSocket server shares with its accept path.
pub type WsDirectory = Directory<WebSocketConnection, JsonCodec>;

/// Builder for configuring and starting a playpool server.
///
/// # Example
///
/// ```rust,ignore
/// use playpool::prelude::*;
///
/// let server = PlaypoolServer::builder()
///     .config(ServerConfig::load("playpool.toml")?)
///     .build()
///     .await?;
/// server.run_until(tokio::signal::ctrl_c()).await
/// ```
#[derive(Debug, Default)]
pub struct PlaypoolServerBuilder {
    config: ServerConfig,
}

impl PlaypoolServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the listen address.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Validates the config, binds the listener and creates the directory
    /// with its first room.
    pub async fn build(self) -> Result<PlaypoolServer, PlaypoolError> {
        self.config.validate()?;

        let transport = WebSocketTransport::bind(&self.config.listen_addr)
            .await?
            .with_path(self.config.ws_path.clone())
            .with_handshake_timeout(self.config.handshake_timeout());
        let directory = Arc::new(Directory::new(self.config.rooms.clone(), JsonCodec));

        Ok(PlaypoolServer {
            transport,
            directory,
            config: self.config,
        })
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct PlaypoolServer {
    transport: WebSocketTransport,
    directory: Arc<WsDirectory>,
    config: ServerConfig,
}

impl PlaypoolServer {
    /// Creates a new builder.
    pub fn builder() -> PlaypoolServerBuilder {
        PlaypoolServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The config the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// A shared handle to the room directory.
    pub fn directory(&self) -> Arc<WsDirectory> {
        Arc::clone(&self.directory)
    }

    /// Runs the accept loop until the transport shuts down. Without a
    /// signal that only happens on a fatal transport error.
    pub async fn run(self) -> Result<(), PlaypoolError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs the accept loop until `signal` resolves, then shuts every room
    /// down.
    ///
    /// Handshakes run on the transport's own tasks and each upgraded
    /// connection is placed on a task of its own, so neither a slow client
    /// nor a slow room holds up the loop.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), PlaypoolError>
    where
        F: Future + Send,
    {
        let addr = self.local_addr().ok();
        tracing::info!(?addr, path = %self.config.ws_path, "playpool server running");

        tokio::pin!(signal);
        let result = loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!("shutdown signal received");
                    break Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let directory = Arc::clone(&self.directory);
                        tokio::spawn(async move {
                            let conn_id = conn.id();
                            if let Err(e) = directory.place(conn).await {
                                tracing::warn!(%conn_id, error = %e, "placement failed");
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => {
                        break Err(PlaypoolError::from(TransportError::Shutdown));
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "accept failed");
                    }
                },
            }
        };

        self.directory.shutdown().await;
        self.transport.shutdown().await?;
        tracing::info!("playpool server stopped");
        result
    }
}
