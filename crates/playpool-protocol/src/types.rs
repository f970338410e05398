//! Core protocol types for playpool's wire format.
//!
//! Two shapes travel on the wire:
//!
//! - [`Envelope`] — server → client, and also the unit a room's event
//!   queue carries internally.
//! - [`ClientNotification`] — client → server. Only its `kind` is read;
//!   the server stamps the sender's identity itself.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identity of a room member.
///
/// Allocated by the room from a counter that never goes backwards, so an
/// id is never reused within its room. This is deliberately NOT the
/// member's position in the room: positions shift when someone leaves,
/// ids don't.
///
/// `#[serde(transparent)]` makes `MemberId(3)` serialize as plain `3`,
/// which is what clients see as `playerId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// A unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// What happened.
///
/// The wire names are the ones browser clients already speak:
/// `Joined` is sent as `"Connected"` and `Left` as `"Disconnected"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A member entered the room.
    #[serde(rename = "Connected")]
    Joined,

    /// A member left the room, by choice or because its transport failed.
    #[serde(rename = "Disconnected")]
    Left,

    /// A member attacked everyone else in the room.
    Attack,

    /// A member scored a point. Never broadcast.
    ScoreUpdate,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Joined => "joined",
            Self::Left => "left",
            Self::Attack => "attack",
            Self::ScoreUpdate => "score-update",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit of information flowing through a room.
///
/// On the wire:
///
/// ```json
/// { "kind": "Attack", "playerId": 4 }
/// ```
///
/// `source` is always the member the event is about: the attacker, the
/// scorer, the one who joined or the one who left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// What happened.
    pub kind: EventKind,

    /// Who it happened to.
    #[serde(rename = "playerId")]
    pub source: MemberId,
}

impl Envelope {
    /// Builds an envelope of any kind.
    pub fn new(kind: EventKind, source: MemberId) -> Self {
        Self { kind, source }
    }

    /// `source` entered the room.
    pub fn joined(source: MemberId) -> Self {
        Self::new(EventKind::Joined, source)
    }

    /// `source` left the room.
    pub fn left(source: MemberId) -> Self {
        Self::new(EventKind::Left, source)
    }
}

// ---------------------------------------------------------------------------
// ClientNotification
// ---------------------------------------------------------------------------

/// What a client sends: just the kind of event.
///
/// Anything else in the payload is ignored. A payload without a valid
/// `kind` fails to decode, which the session treats as a departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientNotification {
    /// The event the client is reporting about itself.
    pub kind: EventKind,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
