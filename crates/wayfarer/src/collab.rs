//! Collaborator interfaces.
//!
//! Storage, messaging, and admission belong to the embedding server.
//! Wayfarer only calls them through these narrow traits. Every method
//! returns [`CollaboratorError`] on failure; the coordinator logs it with
//! the error's source tag and skips that one side effect.

use std::time::Duration;

use wayfarer_protocol::{CollaboratorError, PlayerId, PositionRecord, RegionName};

// ---------------------------------------------------------------------------
// Player directory
// ---------------------------------------------------------------------------

/// What is recorded about a player when their session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Wall-clock time of the departure, in milliseconds since the Unix
    /// epoch.
    pub last_seen_unix_ms: u64,
    /// Time spent online in the session that just ended.
    pub played: Duration,
    /// Where the player was last seen.
    pub last_region: RegionName,
}

/// Persistent per-player facts: join history, play time, mail, rewards.
pub trait PlayerDirectory: Send + Sync + 'static {
    /// Whether the player has ever joined before.
    fn has_joined_before(&self, player_id: PlayerId) -> Result<bool, CollaboratorError>;

    /// Marks the player as having joined.
    fn record_first_join(&self, player_id: PlayerId) -> Result<(), CollaboratorError>;

    /// Persists last-seen time and accumulated play time.
    fn record_departure(
        &self,
        player_id: PlayerId,
        departure: &Departure,
    ) -> Result<(), CollaboratorError>;

    /// Number of unread mail messages waiting for the player.
    fn unread_mail(&self, player_id: PlayerId) -> Result<usize, CollaboratorError>;

    /// Grants whatever play-time rewards are due. `played` is the time
    /// online so far in the current session.
    fn check_rewards(&self, player_id: PlayerId, played: Duration) -> Result<(), CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

/// Something to tell players. The messenger owns the actual wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Broadcast: a player came online.
    Arrival { player_id: PlayerId, first_join: bool },
    /// To the player: welcome content (message of the day).
    Welcome,
    /// To the player: they have unread mail.
    UnreadMail { count: usize },
    /// Broadcast: a player moved between regions.
    RegionChange {
        player_id: PlayerId,
        from: RegionName,
        to: RegionName,
    },
    /// To the player: first visit to this region in the session.
    FirstVisit { region: RegionName },
}

pub trait Messenger: Send + Sync + 'static {
    /// Sends a notice to one player.
    fn send(&self, player_id: PlayerId, notice: &Notice) -> Result<(), CollaboratorError>;

    /// Sends a notice to everyone online.
    fn broadcast(&self, notice: &Notice) -> Result<(), CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// A refused connection attempt. `reason` goes to the host's
/// reject-reason setter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection rejected: {reason}")]
pub struct Rejection {
    pub reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Ban and allow-list checks, consulted on Connect-Start.
pub trait Admission: Send + Sync + 'static {
    /// `Ok(Ok(()))` admits, `Ok(Err(rejection))` refuses.
    fn admit(
        &self,
        player_id: PlayerId,
        username: &str,
    ) -> Result<Result<(), Rejection>, CollaboratorError>;
}

/// Admits everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAdmission;

impl Admission for OpenAdmission {
    fn admit(&self, _: PlayerId, _: &str) -> Result<Result<(), Rejection>, CollaboratorError> {
        Ok(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// Position records
// ---------------------------------------------------------------------------

/// The host's persisted "last position" records, rewritten after a
/// disconnect to force the next login location.
pub trait PositionRecords: Send + Sync + 'static {
    fn load(&self, player_id: PlayerId) -> Result<Option<PositionRecord>, CollaboratorError>;

    fn store(&self, record: &PositionRecord) -> Result<(), CollaboratorError>;
}
