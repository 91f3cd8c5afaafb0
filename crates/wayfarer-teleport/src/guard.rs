//! Per-player teleport debounce.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};
use wayfarer_protocol::PlayerId;

/// Guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Minimum time between an accepted teleport and the next accepted
    /// *automatic* one for the same player. Zero disables the guard.
    ///
    /// Default: 3000 ms.
    pub window_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { window_ms: 3_000 }
    }
}

impl GuardConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Remembers when each player last had a teleport accepted.
///
/// Every operation works on one `DashMap` entry, so the check and the
/// stamp in [`try_acquire_automatic`](Self::try_acquire_automatic) happen
/// with no other caller touching the same player in between.
#[derive(Debug)]
pub struct TeleportGuard {
    last_accepted: DashMap<PlayerId, Instant>,
    window: Duration,
}

impl TeleportGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            last_accepted: DashMap::new(),
            window: config.window(),
        }
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Asks to apply an automatic teleport now.
    ///
    /// Accepts (and stamps the current time) if the player has no entry or
    /// their last accepted teleport is at least one window old. A rejected
    /// request leaves the entry untouched.
    pub fn try_acquire_automatic(&self, player_id: PlayerId) -> bool {
        let now = Instant::now();
        match self.last_accepted.entry(player_id) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                let elapsed = now.saturating_duration_since(*slot.get());
                if elapsed >= self.window {
                    slot.insert(now);
                    true
                } else {
                    debug!(
                        %player_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "automatic teleport rejected by guard"
                    );
                    false
                }
            }
        }
    }

    /// Records a user-initiated teleport. Never rejects, but closes the
    /// window for automatic ones.
    pub fn record_user_initiated(&self, player_id: PlayerId) {
        self.last_accepted.insert(player_id, Instant::now());
        trace!(%player_id, "user teleport recorded");
    }

    /// Forgets the player. Called when their session ends.
    pub fn clear(&self, player_id: &PlayerId) {
        self.last_accepted.remove(player_id);
    }

    /// Number of players with a guard entry.
    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}

impl Default for TeleportGuard {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}
