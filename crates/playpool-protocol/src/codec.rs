//! Codec trait and implementations for turning envelopes into frames.
//!
//! Rooms and sessions never call `serde_json` directly. They go through a
//! [`Codec`], so the wire encoding is a single choice made where the server
//! is assembled.
//!
//! [`JsonCodec`] is the only implementation today: browser clients speak
//! JSON text frames.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Largest inbound frame a codec accepts. Client notifications are a few
/// dozen bytes; anything near this is not a real client.
pub const MAX_FRAME_LEN: usize = 4 * 1024;

/// Encodes values to frame bytes and decodes frame bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync + 'static` → one codec value is shared by a room actor
///   and every reader task it spawns.
/// - `Clone` → each reader task gets its own copy. Codecs are expected to
///   be cheap, stateless values.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected shape, and `ProtocolError::InvalidMessage` for
    /// frames over [`MAX_FRAME_LEN`]. The session treats both as terminal.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use playpool_protocol::{Codec, Envelope, EventKind, JsonCodec, MemberId};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Envelope::new(EventKind::Attack, MemberId(2))).unwrap();
/// assert_eq!(bytes, br#"{"kind":"Attack","playerId":2}"#);
///
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded.source, MemberId(2));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        if data.len() > MAX_FRAME_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "frame of {} bytes exceeds {MAX_FRAME_LEN}",
                data.len()
            )));
        }
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
