//! Session types: the data the server keeps about an online player.
//!
//! A session tracks:
//! - WHO the player is (`PlayerId`)
//! - WHERE they are (current region, or the region they just vacated)
//! - WHICH connect cycle this is (`epoch`)
//! - WHAT one-time region announcements they have already seen

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use wayfarer_protocol::{PlayerId, RegionName};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for presence tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long (in milliseconds) a player may sit in `RegionChanging`
    /// with neither a Region-Enter nor a Disconnect arriving before the
    /// reconciliation sweep declares them offline.
    ///
    /// Default: 30 000 ms.
    pub leave_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            leave_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    /// Smallest leave timeout accepted by [`validated`](Self::validated).
    pub const MIN_LEAVE_TIMEOUT_MS: u64 = 1_000;

    /// The leave timeout as a `Duration`.
    pub fn leave_timeout(&self) -> Duration {
        Duration::from_millis(self.leave_timeout_ms)
    }

    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.leave_timeout_ms < Self::MIN_LEAVE_TIMEOUT_MS {
            tracing::warn!(
                leave_timeout_ms = self.leave_timeout_ms,
                min = Self::MIN_LEAVE_TIMEOUT_MS,
                "leave_timeout_ms below minimum, clamping"
            );
            self.leave_timeout_ms = Self::MIN_LEAVE_TIMEOUT_MS;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a player stands, as far as presence is concerned.
///
/// ```text
///               enter(r)                  leave(r)
///   Offline ─────────────→ Online{r} ─────────────→ RegionChanging{from: r}
///      ↑                    │  ↑                       │        │
///      │     disconnect     │  └─────── enter(to) ─────┘        │
///      ├────────────────────┘                                   │
///      └─────────────── disconnect / leave timeout ─────────────┘
/// ```
///
/// An `Online{r}` player entering a different region without a prior
/// leave moves straight to `Online{x}` (the host dropped the leave).
///
/// Side effects (join broadcasts, welcome content, mail checks) only fire
/// while a player is `Online`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No live session.
    Offline,

    /// In `region`, fully present.
    Online { region: RegionName },

    /// Left `from` and has not been seen entering anywhere yet. `since`
    /// records when the first Region-Leave arrived so a player stuck
    /// here can be reconciled to offline.
    RegionChanging { from: RegionName, since: Instant },
}

impl SessionState {
    /// Returns `true` only for `Online`.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online { .. })
    }

    /// Returns `true` for any state with a live session.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// The region the player is in, or last left while changing regions.
    pub fn region(&self) -> Option<&RegionName> {
        match self {
            Self::Offline => None,
            Self::Online { region } => Some(region),
            Self::RegionChanging { from, .. } => Some(from),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => write!(f, "Offline"),
            Self::Online { region } => write!(f, "Online({region})"),
            Self::RegionChanging { from, .. } => write!(f, "RegionChanging(from {from})"),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerSession
// ---------------------------------------------------------------------------

/// One connected player.
///
/// Created on the first Online transition and removed from the tracker on
/// a confirmed Offline transition. Never garbage-collected behind the
/// tracker's back: a stale entry would carry one session's state into the
/// next.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    /// Which player this session belongs to.
    pub player_id: PlayerId,

    /// Current presence state. Never `Offline` while stored.
    pub state: SessionState,

    /// The region the player was in before the current one, if they have
    /// changed regions during this session.
    pub last_region: Option<RegionName>,

    /// Connect-cycle counter. Strictly larger than every epoch this
    /// player had before; scheduled work captured with an older epoch is
    /// dropped.
    pub epoch: u64,

    /// When the player came online, for play-time accounting.
    pub online_since: Instant,

    /// Regions whose one-time-per-session announcement already fired.
    pub seen_region_announcements: HashSet<RegionName>,
}

impl PlayerSession {
    pub(crate) fn new(player_id: PlayerId, region: RegionName, epoch: u64, now: Instant) -> Self {
        Self {
            player_id,
            state: SessionState::Online { region },
            last_region: None,
            epoch,
            online_since: now,
            seen_region_announcements: HashSet::new(),
        }
    }

    /// The region the player currently occupies (or just vacated).
    pub fn current_region(&self) -> Option<&RegionName> {
        self.state.region()
    }

    /// How long this session has been online as of `now`.
    pub fn online_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.online_since)
    }
}
