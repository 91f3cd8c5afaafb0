//! Configuration for a Wayfarer instance.
//!
//! Every section is optional in the file: `#[serde(default)]` fills in
//! whatever is missing, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "lifecycle": { "spawn_on_join": "first_join", "reward_check_interval_ms": 600000 },
//!   "respawn": { "default_region": "Overworld", "excluded_regions": ["arena*"] },
//!   "guard": { "window_ms": 3000 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wayfarer_scheduler::SchedulerConfig;
use wayfarer_session::SessionConfig;
use wayfarer_teleport::{GuardConfig, RespawnConfig};

use crate::WayfarerError;

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

/// When a joining player is teleported to the default region's spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnOnJoin {
    #[default]
    Never,
    /// Only on a player's first-ever join.
    FirstJoin,
    Always,
}

impl SpawnOnJoin {
    pub fn applies(self, is_first_join: bool) -> bool {
        match self {
            Self::Never => false,
            Self::FirstJoin => is_first_join,
            Self::Always => true,
        }
    }
}

/// Side effects driven by lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Delay before the "player joined" broadcast.
    pub arrival_announcement_delay_ms: u64,

    /// Delay before welcome content (message of the day) is sent.
    pub welcome_delay_ms: u64,

    /// Delay before the unread-mail check.
    pub mail_check_delay_ms: u64,

    /// Broadcast a notice when a player moves between regions.
    pub announce_region_changes: bool,

    /// Delay before region-change and first-visit notices.
    pub region_announcement_delay_ms: u64,

    /// Send a one-time-per-session notice the first time a player enters
    /// each region.
    pub first_visit_announcements: bool,

    pub spawn_on_join: SpawnOnJoin,

    /// Delay before the join-to-spawn teleport.
    pub join_teleport_delay_ms: u64,

    /// Rewrite a departing player's saved position to the default
    /// region's spawn, so they log back in there.
    pub force_spawn_on_login: bool,

    /// How long after a disconnect the position rewrite happens. Must
    /// outlast the host's own disconnect save, which would otherwise
    /// overwrite it.
    pub position_rewrite_delay_ms: u64,

    /// Interval of the periodic play-time reward check. Zero disables it.
    pub reward_check_interval_ms: u64,

    /// How often stuck region changes are reconciled.
    pub sweep_interval_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            arrival_announcement_delay_ms: 500,
            welcome_delay_ms: 1_000,
            mail_check_delay_ms: 2_000,
            announce_region_changes: true,
            region_announcement_delay_ms: 500,
            first_visit_announcements: true,
            spawn_on_join: SpawnOnJoin::Never,
            join_teleport_delay_ms: 1_000,
            force_spawn_on_login: false,
            position_rewrite_delay_ms: 2_000,
            reward_check_interval_ms: 0,
            sweep_interval_ms: 5_000,
        }
    }
}

impl LifecycleConfig {
    pub const MIN_SWEEP_INTERVAL_MS: u64 = 1_000;

    pub fn arrival_announcement_delay(&self) -> Duration {
        Duration::from_millis(self.arrival_announcement_delay_ms)
    }

    pub fn welcome_delay(&self) -> Duration {
        Duration::from_millis(self.welcome_delay_ms)
    }

    pub fn mail_check_delay(&self) -> Duration {
        Duration::from_millis(self.mail_check_delay_ms)
    }

    pub fn region_announcement_delay(&self) -> Duration {
        Duration::from_millis(self.region_announcement_delay_ms)
    }

    pub fn join_teleport_delay(&self) -> Duration {
        Duration::from_millis(self.join_teleport_delay_ms)
    }

    pub fn position_rewrite_delay(&self) -> Duration {
        Duration::from_millis(self.position_rewrite_delay_ms)
    }

    /// `None` when reward checks are disabled.
    pub fn reward_check_interval(&self) -> Option<Duration> {
        (self.reward_check_interval_ms > 0)
            .then(|| Duration::from_millis(self.reward_check_interval_ms))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.sweep_interval_ms < Self::MIN_SWEEP_INTERVAL_MS {
            tracing::warn!(
                sweep_interval_ms = self.sweep_interval_ms,
                min = Self::MIN_SWEEP_INTERVAL_MS,
                "sweep_interval_ms below minimum, clamping"
            );
            self.sweep_interval_ms = Self::MIN_SWEEP_INTERVAL_MS;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// WayfarerConfig
// ---------------------------------------------------------------------------

/// Everything a Wayfarer instance can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfarerConfig {
    pub session: SessionConfig,
    pub lifecycle: LifecycleConfig,
    pub respawn: RespawnConfig,
    pub guard: GuardConfig,
    pub scheduler: SchedulerConfig,
}

impl WayfarerConfig {
    /// Parses a JSON configuration. The result is already validated.
    pub fn from_json_str(json: &str) -> Result<Self, WayfarerError> {
        let config: Self = serde_json::from_str(json).map_err(WayfarerError::Config)?;
        Ok(config.validated())
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, WayfarerError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Clamps every section.
    pub fn validated(self) -> Self {
        Self {
            session: self.session.validated(),
            lifecycle: self.lifecycle.validated(),
            ..self
        }
    }
}
