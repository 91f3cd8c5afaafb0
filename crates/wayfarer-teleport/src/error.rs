//! Error types for the teleport layer.

/// Errors raised while building teleport components.
///
/// Teleport execution itself never errors out to the caller: rejections
/// and collaborator failures are logged and the teleport is skipped.
#[derive(Debug, thiserror::Error)]
pub enum TeleportError {
    /// An exclusion pattern could not be compiled.
    #[error("invalid region pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
