//! Error types shared across the workspace.
//!
//! [`ProtocolError`] covers encoding and decoding of persisted records.
//! [`CollaboratorError`] is what every external collaborator (storage,
//! messaging, admission) reports when it fails. Wayfarer never lets a
//! collaborator failure escape a lifecycle transition: callers log it with
//! its source tag and carry on.

/// Errors that can occur while encoding or decoding records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: a truncated file left behind by a crash, or a
    /// record written by a different tool with missing fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The record decoded but is not usable (for example, it belongs to
    /// a different player than the file it was read from).
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// A failure reported by an external collaborator.
///
/// `source_tag` names the collaborator ("directory", "spawns",
/// "position-records", ...) so log lines can be traced back to the
/// integration that misbehaved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{source_tag}: {message}")]
pub struct CollaboratorError {
    /// Short, stable name of the failing collaborator.
    pub source_tag: &'static str,
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl CollaboratorError {
    /// Creates a new collaborator error.
    pub fn new(source_tag: &'static str, message: impl Into<String>) -> Self {
        Self {
            source_tag,
            message: message.into(),
        }
    }
}
