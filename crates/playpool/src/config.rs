//! Server configuration, loaded from `playpool.toml`.

use std::path::{Path, PathBuf};

use playpool_room::RoomConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`ServerConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Override { var: &'static str, value: String },

    /// A setting is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level server configuration.
///
/// ```toml
/// listen_addr = "0.0.0.0:3000"
/// ws_path = "/ws"
/// handshake_timeout_ms = 10000
///
/// [rooms]
/// capacity = 10
/// queue_size = 64
/// send_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// The only request path that is upgraded.
    pub ws_path: String,
    /// How long a client may take to finish the WebSocket upgrade.
    pub handshake_timeout_ms: u64,
    /// Settings applied to every room.
    pub rooms: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            ws_path: "/ws".to_string(),
            handshake_timeout_ms: 10_000,
            rooms: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// The handshake timeout as a [`Duration`](std::time::Duration).
    pub fn handshake_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Loads config from `path` if it exists, applies `PLAYPOOL_*`
    /// environment overrides, then validates the result.
    ///
    /// A missing file is not an error: the defaults are used.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml(&content).map_err(|source| {
                    ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                tracing::info!(path = %path.display(), "loaded configuration");
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies overrides looked up by environment variable name.
    ///
    /// Empty values are skipped.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(addr) = var("PLAYPOOL_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(path) = var("PLAYPOOL_WS_PATH") {
            self.ws_path = path;
        }
        if let Some(value) = var("PLAYPOOL_ROOM_CAPACITY") {
            self.rooms.capacity = parse_override("PLAYPOOL_ROOM_CAPACITY", value)?;
        }
        if let Some(value) = var("PLAYPOOL_SEND_TIMEOUT_MS") {
            self.rooms.send_timeout_ms =
                parse_override("PLAYPOOL_SEND_TIMEOUT_MS", value)?;
        }
        Ok(())
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("listen_addr must be set".into()));
        }
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "ws_path must start with '/', got {:?}",
                self.ws_path
            )));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_ms must be > 0".into(),
            ));
        }
        if self.rooms.capacity == 0 {
            return Err(ConfigError::Invalid("rooms.capacity must be > 0".into()));
        }
        if self.rooms.queue_size == 0 {
            return Err(ConfigError::Invalid("rooms.queue_size must be > 0".into()));
        }
        if self.rooms.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "rooms.send_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(
    var: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Override { var, value })
}
