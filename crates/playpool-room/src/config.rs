//! Room configuration.

use std::time::Duration;

use playpool_session::SessionConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a directory creates.
///
/// Deserializable from the `[rooms]` table of the server config file;
/// missing keys fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum members per room.
    pub capacity: usize,

    /// Bound of the room's event queue. Reader tasks wait when it's full.
    pub queue_size: usize,

    /// How long one outbound send may take before the recipient is
    /// dropped from the room, in milliseconds.
    pub send_timeout_ms: u64,
}

impl RoomConfig {
    /// The send timeout as a [`Duration`].
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Per-session settings derived from this room config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            send_timeout: self.send_timeout(),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            queue_size: 64,
            send_timeout_ms: 5_000,
        }
    }
}
