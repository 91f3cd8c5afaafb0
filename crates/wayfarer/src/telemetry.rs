//! Logging bootstrap.

use tracing_subscriber::{EnvFilter, fmt};

use crate::WayfarerError;

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, defaulting
/// to `info` when the variable is unset or invalid.
///
/// Embedding servers that already configure `tracing` should skip this.
///
/// # Errors
/// [`WayfarerError::Logging`] if a global subscriber is already set.
pub fn init_logging() -> Result<(), WayfarerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| WayfarerError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_second_call_errors() {
        // Another test may have installed one first; the second call
        // fails either way.
        let _ = init_logging();
        assert!(matches!(init_logging(), Err(WayfarerError::Logging(_))));
    }
}
