//! Death-respawn routing.
//!
//! When a player dies, the host would respawn them in the region they
//! died in. Deployments with a single "home" region want players sent
//! back there instead. [`RespawnRouter::decide`] picks one of four
//! outcomes, first matching rule wins:
//!
//! 1. the player has a native respawn point (bed) in the death region:
//!    leave it to the host ([`RespawnDecision::UseHostDefault`])
//! 2. per-region spawn is enabled: the host's per-region spawn applies
//!    ([`RespawnDecision::UseHostNative`])
//! 3. the player died in the default region: same
//! 4. the death region matches an exclusion pattern: skip
//! 5. the default region has no stored spawn: skip
//! 6. otherwise: teleport to the default region's spawn
//!    ([`RespawnDecision::CrossRegion`])
//!
//! [`RespawnRouter::route`] then carries out a cross-region decision:
//! after `respawn_delay_ms`, on the death region's context, it takes the
//! teleport guard and issues the teleport. A guard rejection means some
//! other teleport just landed; the respawn is dropped, never retried.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use wayfarer_protocol::{DeathEvent, Position, RegionName, Rotation};
use wayfarer_scheduler::{DelayedActionScheduler, ExecutionTarget};

use crate::{RegionPattern, SpawnStore, TeleportError, TeleportGuard, Teleporter};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Respawn routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespawnConfig {
    /// The region dead players are routed back to.
    pub default_region: RegionName,

    /// When `true`, every region keeps its own spawn and the router never
    /// moves anyone.
    pub per_region_spawn: bool,

    /// Region globs (`*` wildcard, case-insensitive) whose deaths are
    /// left alone.
    pub excluded_regions: Vec<String>,

    /// Delay before the respawn teleport, so it does not race the host's
    /// own respawn handshake.
    ///
    /// Default: 500 ms.
    pub respawn_delay_ms: u64,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            default_region: RegionName::from("world"),
            per_region_spawn: false,
            excluded_regions: Vec::new(),
            respawn_delay_ms: 500,
        }
    }
}

impl RespawnConfig {
    pub fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Why a death was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The death region matched this exclusion pattern.
    Excluded { pattern: String },
    /// The default region has no stored spawn.
    NoStoredSpawn,
    /// The spawn lookup failed.
    SpawnLookupFailed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excluded { pattern } => write!(f, "region excluded by {pattern:?}"),
            Self::NoStoredSpawn => write!(f, "no stored spawn for default region"),
            Self::SpawnLookupFailed => write!(f, "spawn lookup failed"),
        }
    }
}

/// Where a dead player should come back. Produced per death, never
/// stored.
#[derive(Debug, Clone, PartialEq)]
pub enum RespawnDecision {
    /// The player's own respawn point applies.
    UseHostDefault,
    /// The host's per-region spawn applies.
    UseHostNative,
    /// Teleport into `target_region` at `position` / `rotation`.
    CrossRegion {
        target_region: RegionName,
        position: Position,
        rotation: Rotation,
    },
    /// Do nothing; the host's fallback applies.
    Skip(SkipReason),
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Decides and executes death respawns.
pub struct RespawnRouter {
    config: RespawnConfig,
    excluded: Vec<RegionPattern>,
    guard: Arc<TeleportGuard>,
    scheduler: DelayedActionScheduler,
    spawns: Arc<dyn SpawnStore>,
    teleporter: Arc<dyn Teleporter>,
}

impl RespawnRouter {
    /// Builds a router, compiling the exclusion patterns up front.
    ///
    /// # Errors
    /// [`TeleportError::Pattern`] if an exclusion pattern is invalid.
    pub fn new(
        config: RespawnConfig,
        guard: Arc<TeleportGuard>,
        scheduler: DelayedActionScheduler,
        spawns: Arc<dyn SpawnStore>,
        teleporter: Arc<dyn Teleporter>,
    ) -> Result<Self, TeleportError> {
        let excluded = RegionPattern::compile_all(&config.excluded_regions)?;
        Ok(Self {
            config,
            excluded,
            guard,
            scheduler,
            spawns,
            teleporter,
        })
    }

    pub fn config(&self) -> &RespawnConfig {
        &self.config
    }

    /// Applies the routing rules to one death. Pure apart from the spawn
    /// lookup; schedules nothing.
    pub fn decide(&self, death: &DeathEvent) -> RespawnDecision {
        if death.has_native_respawn {
            return RespawnDecision::UseHostDefault;
        }
        if self.config.per_region_spawn || death.region == self.config.default_region {
            return RespawnDecision::UseHostNative;
        }
        if let Some(pattern) = self.excluded.iter().find(|p| p.matches(death.region.as_str())) {
            return RespawnDecision::Skip(SkipReason::Excluded {
                pattern: pattern.as_str().to_owned(),
            });
        }

        match self.spawns.spawn(&self.config.default_region) {
            Ok(Some(spawn)) => RespawnDecision::CrossRegion {
                target_region: self.config.default_region.clone(),
                position: spawn.position,
                rotation: spawn.rotation,
            },
            Ok(None) => RespawnDecision::Skip(SkipReason::NoStoredSpawn),
            Err(error) => {
                warn!(
                    player_id = %death.player_id,
                    source = error.source_tag,
                    %error,
                    "spawn lookup failed, leaving respawn to host"
                );
                RespawnDecision::Skip(SkipReason::SpawnLookupFailed)
            }
        }
    }

    /// Decides, and for a cross-region decision schedules the teleport.
    ///
    /// Returns the decision either way. A player with no live session
    /// gets the decision but nothing is scheduled.
    pub fn route(&self, death: &DeathEvent) -> RespawnDecision {
        let decision = self.decide(death);
        let player_id = death.player_id;

        let RespawnDecision::CrossRegion {
            target_region,
            position,
            rotation,
        } = &decision
        else {
            debug!(%player_id, region = %death.region, ?decision, "no respawn teleport");
            return decision;
        };

        let Some(epoch) = self.scheduler.sessions().epoch_of(&player_id) else {
            debug!(%player_id, "death without a live session, respawn not scheduled");
            return decision;
        };

        let guard = Arc::clone(&self.guard);
        let teleporter = Arc::clone(&self.teleporter);
        let target = target_region.clone();
        let (position, rotation) = (*position, *rotation);

        self.scheduler.schedule(
            player_id,
            epoch,
            self.config.respawn_delay(),
            ExecutionTarget::Region(death.region.clone()),
            move || {
                if !guard.try_acquire_automatic(player_id) {
                    debug!(%player_id, "respawn teleport dropped, another teleport just landed");
                    return Ok(());
                }
                teleporter.issue_teleport(player_id, Some(&target), position, rotation)?;
                trace!(%player_id, region = %target, %position, "respawn teleport issued");
                Ok(())
            },
        );

        decision
    }

    /// Whether `region` is covered by an exclusion pattern.
    pub fn is_excluded(&self, region: &RegionName) -> bool {
        self.excluded.iter().any(|p| p.matches(region.as_str()))
    }

    /// The shared guard this router takes before teleporting.
    pub fn guard(&self) -> &Arc<TeleportGuard> {
        &self.guard
    }
}

impl std::fmt::Debug for RespawnRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespawnRouter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
