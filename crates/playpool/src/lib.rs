//! # playpool
//!
//! A real-time relay for small multiplayer games.
//!
//! Clients connect over WebSocket and are seated first-fit into bounded
//! rooms. Each room relays a handful of event kinds between its members:
//! joins, departures and attacks are fanned out, score updates stay on the
//! server. The layers are separate crates:
//!
//! - `playpool-transport` — the [`Connection`](playpool_transport::Connection)
//!   trait, WebSocket and in-memory transports
//! - `playpool-protocol` — envelopes and the JSON codec
//! - `playpool-session` — one client's send path and reader task
//! - `playpool-room` — room actors and the [`Directory`](playpool_room::Directory)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playpool::prelude::*;
//!
//! # async fn start() -> Result<(), PlaypoolError> {
//! let server = PlaypoolServer::builder()
//!     .config(ServerConfig::load("playpool.toml")?)
//!     .build()
//!     .await?;
//! server.run_until(tokio::signal::ctrl_c()).await
//! # }
//! ```

mod config;
mod error;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::PlaypoolError;
pub use server::{PlaypoolServer, PlaypoolServerBuilder, WsDirectory};

/// Everything needed to run a server or drive rooms directly.
pub mod prelude {
    pub use crate::{
        ConfigError, PlaypoolError, PlaypoolServer, PlaypoolServerBuilder,
        ServerConfig,
    };
    pub use playpool_protocol::{
        ClientNotification, Codec, Envelope, EventKind, JsonCodec, MemberId,
        RoomId,
    };
    pub use playpool_room::{
        Directory, MemberSnapshot, Placement, RoomConfig, RoomError,
        RoomHandle, RoomInfo,
    };
    pub use playpool_session::{Session, SessionConfig, SessionError};
    pub use playpool_transport::{
        Connection, ConnectionId, Transport, TransportError,
    };
}
