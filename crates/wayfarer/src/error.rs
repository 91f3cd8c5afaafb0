//! Unified error type for Wayfarer.

use wayfarer_protocol::ProtocolError;
use wayfarer_region::RegionError;
use wayfarer_scheduler::ScheduleError;
use wayfarer_session::SessionError;
use wayfarer_teleport::TeleportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Only setup and storage paths return it: building a [`Wayfarer`]
/// instance, loading configuration, installing logging, reading or
/// writing position records. Event handling itself never fails outward.
///
/// [`Wayfarer`]: crate::Wayfarer
#[derive(Debug, thiserror::Error)]
pub enum WayfarerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// An exclusion pattern or other teleport setting is invalid.
    #[error(transparent)]
    Teleport(#[from] TeleportError),

    /// The configuration file is not valid JSON for [`WayfarerConfig`].
    ///
    /// [`WayfarerConfig`]: crate::WayfarerConfig
    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A global tracing subscriber was already installed.
    #[error("failed to install logging: {0}")]
    Logging(String),

    /// The builder was asked to build without a required collaborator.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}
