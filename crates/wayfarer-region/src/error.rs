//! Error types for the region layer.

use wayfarer_protocol::RegionName;

/// Errors that can occur when handing work to a region executor.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// No executor is running for this region.
    #[error("region {0} not found")]
    NotFound(RegionName),

    /// The executor's channel is closed (the region shut down between
    /// lookup and submission).
    #[error("region {0} is unavailable")]
    Unavailable(RegionName),
}
