//! Codec trait and implementations for persisted records.
//!
//! Position records are small files the host reads back on login. The
//! storage code doesn't care how a record becomes bytes; it just needs
//! something that implements [`Codec`]. [`JsonCodec`] is the default
//! because the host's own player files are JSON and operators edit them
//! by hand.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` so a codec can live inside collaborators that
/// are shared across region executors and timer tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that writes pretty-printed JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use wayfarer_protocol::{Codec, JsonCodec, PlayerId, PositionRecord, SpawnPoint};
///
/// let codec = JsonCodec;
/// let record = PositionRecord::at_spawn(
///     PlayerId(1),
///     "Overworld".into(),
///     SpawnPoint::new(100.0, 64.0, 200.0, 90.0),
/// );
///
/// let bytes = codec.encode(&record).unwrap();
/// let decoded: PositionRecord = codec.decode(&bytes).unwrap();
/// assert_eq!(record, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec_pretty(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
