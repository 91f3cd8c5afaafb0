//! The lifecycle coordinator: host notifications in, side effects out.
//!
//! Every host callback lands here. Presence notifications go through the
//! [`SessionTracker`]; whatever semantic transition comes out drives the
//! collaborator side effects:
//!
//! | transition      | side effects                                                     |
//! |-----------------|------------------------------------------------------------------|
//! | `OnlineJoin`    | first-join lookup, then scheduled arrival broadcast, welcome,     |
//! |                 | mail check, optional join-to-spawn, optional reward checks        |
//! | `RegionChanged` | scheduled region-change broadcast and first-visit notice          |
//! | `OfflineLeave`  | departure recorded, guard cleared, pending actions cancelled,     |
//! |                 | optional delayed rewrite of the saved position                    |
//!
//! Handlers never fail outward. Collaborator errors are logged with their
//! source tag and only skip the one side effect.
//!
//! # Ordering
//!
//! A player's notifications can arrive from two region contexts at once.
//! Each player has a turn lock that is held from the moment a notification
//! is observed until its side effects have been applied, so a player's
//! lifecycle events go out in the order their transitions happened. A
//! handler only ever waits on its own player's turn.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use wayfarer_protocol::{
    CollaboratorError, DeathEvent, HostEvent, LifecycleEvent, PlayerId, PositionRecord,
    RegionName, SpawnPoint,
};
use wayfarer_region::RegionManager;
use wayfarer_scheduler::{DelayedActionScheduler, ExecutionTarget};
use wayfarer_session::{PresenceEvent, SessionTracker, Transition, TransitionKind};
use wayfarer_teleport::{RespawnDecision, RespawnRouter, SpawnStore, TeleportGuard, Teleporter};

use crate::{
    Admission, Departure, LifecycleConfig, Messenger, Notice, PlayerDirectory, PositionRecords,
    Rejection, WayfarerConfig, WayfarerError,
};

/// Capacity of the lifecycle event channel. Slow subscribers that fall
/// further behind than this see `RecvError::Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The external collaborators a coordinator calls.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn PlayerDirectory>,
    pub messenger: Arc<dyn Messenger>,
    pub admission: Arc<dyn Admission>,
    pub spawns: Arc<dyn SpawnStore>,
    pub teleporter: Arc<dyn Teleporter>,
    /// Needed only when `force_spawn_on_login` is set.
    pub records: Option<Arc<dyn PositionRecords>>,
}

/// Orchestrates sessions, scheduling, teleports, and collaborators.
pub struct LifecycleCoordinator {
    config: LifecycleConfig,
    sessions: Arc<SessionTracker>,
    scheduler: DelayedActionScheduler,
    guard: Arc<TeleportGuard>,
    router: RespawnRouter,
    collab: Collaborators,
    events: broadcast::Sender<LifecycleEvent>,
    /// Per-player turn locks. Retired once the player has no session.
    turns: DashMap<PlayerId, Arc<Mutex<()>>>,
}

impl LifecycleCoordinator {
    /// Wires up a coordinator with fresh session, region, scheduler, and
    /// guard state.
    pub fn new(config: &WayfarerConfig, collab: Collaborators) -> Result<Self, WayfarerError> {
        let config = config.clone().validated();
        let sessions = Arc::new(SessionTracker::new(config.session.clone()));
        let regions = Arc::new(RegionManager::new());
        let scheduler =
            DelayedActionScheduler::new(Arc::clone(&sessions), regions, config.scheduler.clone());
        let guard = Arc::new(TeleportGuard::new(&config.guard));
        let router = RespawnRouter::new(
            config.respawn.clone(),
            Arc::clone(&guard),
            scheduler.clone(),
            Arc::clone(&collab.spawns),
            Arc::clone(&collab.teleporter),
        )?;

        if config.lifecycle.force_spawn_on_login && collab.records.is_none() {
            return Err(WayfarerError::MissingCollaborator("position records"));
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: config.lifecycle,
            sessions,
            scheduler,
            guard,
            router,
            collab,
            events,
            turns: DashMap::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Host callbacks
    // -----------------------------------------------------------------------

    /// Connect-Start: asks admission whether the player may join.
    ///
    /// Does not touch presence state. If the admission check itself fails
    /// the player is admitted.
    pub fn on_connect_start(&self, player_id: PlayerId, username: &str) -> Result<(), Rejection> {
        match self.collab.admission.admit(player_id, username) {
            Ok(Ok(())) => {
                debug!(%player_id, username, "connection admitted");
                Ok(())
            }
            Ok(Err(rejection)) => {
                info!(%player_id, username, reason = %rejection.reason, "connection rejected");
                Err(rejection)
            }
            Err(error) => {
                log_failure(player_id, &error, "admission check");
                Ok(())
            }
        }
    }

    pub fn on_region_enter(&self, player_id: PlayerId, region: RegionName) {
        self.observe_and_apply(player_id, PresenceEvent::Enter(region));
    }

    pub fn on_region_leave(&self, player_id: PlayerId, region: RegionName) {
        self.observe_and_apply(player_id, PresenceEvent::Leave(region));
    }

    /// Safe to call more than once per disconnect.
    pub fn on_disconnect(&self, player_id: PlayerId) {
        self.observe_and_apply(player_id, PresenceEvent::Disconnect);
    }

    /// Death-recovery: routes the respawn and returns the decision.
    pub fn on_death(&self, death: &DeathEvent) -> RespawnDecision {
        self.router.route(death)
    }

    /// Dispatches one host notification to the matching callback.
    pub fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::RegionEnter { player_id, region } => self.on_region_enter(player_id, region),
            HostEvent::RegionLeave { player_id, region } => self.on_region_leave(player_id, region),
            HostEvent::Disconnect { player_id } => self.on_disconnect(player_id),
            HostEvent::Death(death) => {
                self.on_death(&death);
            }
        }
    }

    /// Declares offline every player stuck mid region change past the
    /// leave timeout. Returns how many were reconciled.
    pub fn reconcile(&self) -> usize {
        self.sessions
            .stale_leaves()
            .into_iter()
            .filter(|(player_id, event)| {
                let reconciled = self.observe_and_apply(*player_id, event.clone());
                if reconciled {
                    info!(%player_id, "no region entered after leave, treating as offline");
                }
                reconciled
            })
            .count()
    }

    // -----------------------------------------------------------------------
    // Collaborator-facing API
    // -----------------------------------------------------------------------

    /// A user-initiated teleport (command, menu). Always issued; closes
    /// the automatic teleport window for the player.
    pub fn teleport_user(
        &self,
        player_id: PlayerId,
        target_region: Option<&RegionName>,
        spawn: SpawnPoint,
    ) -> Result<(), CollaboratorError> {
        self.guard.record_user_initiated(player_id);
        self.collab
            .teleporter
            .issue_teleport(player_id, target_region, spawn.position, spawn.rotation)
    }

    /// Subscribes to semantic lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.sessions
    }

    /// The scheduler, for collaborators with session-scoped delayed work.
    pub fn scheduler(&self) -> &DelayedActionScheduler {
        &self.scheduler
    }

    pub fn regions(&self) -> &Arc<RegionManager> {
        self.scheduler.regions()
    }

    pub fn guard(&self) -> &Arc<TeleportGuard> {
        &self.guard
    }

    pub fn router(&self) -> &RespawnRouter {
        &self.router
    }

    /// Stops every region executor.
    pub fn shutdown(&self) {
        let regions = self.regions();
        for region in regions.names() {
            if let Err(error) = regions.close(&region) {
                debug!(%region, %error, "region already closed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Feeds one notification through the tracker and applies whatever
    /// transition it produces, holding the player's turn throughout.
    /// Returns whether a transition was applied.
    fn observe_and_apply(&self, player_id: PlayerId, event: PresenceEvent) -> bool {
        loop {
            let turn = Arc::clone(self.turns.entry(player_id).or_default().value());
            let _held = turn.lock().unwrap_or_else(PoisonError::into_inner);

            // The previous holder may have retired this turn while we
            // waited for it.
            let current = self
                .turns
                .get(&player_id)
                .is_some_and(|entry| Arc::ptr_eq(entry.value(), &turn));
            if !current {
                continue;
            }

            let transition = self.sessions.observe(player_id, event);
            let applied = transition.is_some();
            if let Some(transition) = transition {
                self.apply(transition);
            }
            if self.sessions.epoch_of(&player_id).is_none() {
                self.turns.remove(&player_id);
            }
            return applied;
        }
    }

    fn apply(&self, transition: Transition) {
        match &transition.kind {
            TransitionKind::OnlineJoin { region } => self.on_online_join(&transition, region),
            TransitionKind::RegionChanged { from, to } => {
                self.on_region_changed(&transition, from, to)
            }
            TransitionKind::OfflineLeave { last_region } => {
                self.on_offline_leave(&transition, last_region)
            }
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn on_online_join(&self, transition: &Transition, region: &RegionName) {
        let player_id = transition.player_id;
        let epoch = transition.epoch;

        let first_join = match self.collab.directory.has_joined_before(player_id) {
            Ok(joined) => !joined,
            Err(error) => {
                log_failure(player_id, &error, "join history lookup");
                false
            }
        };
        if first_join {
            if let Err(error) = self.collab.directory.record_first_join(player_id) {
                log_failure(player_id, &error, "first join record");
            }
        }

        // The join region counts as visited; first-visit notices are for
        // regions reached later in the session.
        self.sessions.mark_region_announced(&player_id, epoch, region);

        info!(%player_id, %region, epoch, first_join, "player online");
        self.emit(LifecycleEvent::OnlineJoin {
            player_id,
            is_first_join: first_join,
        });

        let messenger = Arc::clone(&self.collab.messenger);
        self.scheduler.schedule(
            player_id,
            epoch,
            self.config.arrival_announcement_delay(),
            ExecutionTarget::PlayerRegion,
            move || {
                messenger.broadcast(&Notice::Arrival {
                    player_id,
                    first_join,
                })?;
                Ok(())
            },
        );

        let messenger = Arc::clone(&self.collab.messenger);
        self.scheduler.schedule(
            player_id,
            epoch,
            self.config.welcome_delay(),
            ExecutionTarget::PlayerRegion,
            move || {
                messenger.send(player_id, &Notice::Welcome)?;
                Ok(())
            },
        );

        let messenger = Arc::clone(&self.collab.messenger);
        let directory = Arc::clone(&self.collab.directory);
        self.scheduler.schedule(
            player_id,
            epoch,
            self.config.mail_check_delay(),
            ExecutionTarget::PlayerRegion,
            move || {
                let count = directory.unread_mail(player_id)?;
                if count > 0 {
                    messenger.send(player_id, &Notice::UnreadMail { count })?;
                }
                Ok(())
            },
        );

        if self.config.spawn_on_join.applies(first_join) {
            self.schedule_join_teleport(player_id, epoch);
        }

        if let Some(period) = self.config.reward_check_interval() {
            let directory = Arc::clone(&self.collab.directory);
            let online_since = transition.online_since;
            self.scheduler.schedule_repeating(
                player_id,
                epoch,
                period,
                ExecutionTarget::PlayerRegion,
                move || {
                    let played = Instant::now().saturating_duration_since(online_since);
                    directory.check_rewards(player_id, played)?;
                    Ok(())
                },
            );
        }
    }

    /// Automatic teleport to the default region's spawn, guarded.
    fn schedule_join_teleport(&self, player_id: PlayerId, epoch: u64) {
        let spawns = Arc::clone(&self.collab.spawns);
        let teleporter = Arc::clone(&self.collab.teleporter);
        let guard = Arc::clone(&self.guard);
        let target = self.router.config().default_region.clone();

        self.scheduler.schedule(
            player_id,
            epoch,
            self.config.join_teleport_delay(),
            ExecutionTarget::PlayerRegion,
            move || {
                let Some(spawn) = spawns.spawn(&target)? else {
                    debug!(%player_id, region = %target, "no stored spawn, join teleport skipped");
                    return Ok(());
                };
                if !guard.try_acquire_automatic(player_id) {
                    debug!(%player_id, "join teleport dropped, another teleport just landed");
                    return Ok(());
                }
                teleporter.issue_teleport(
                    player_id,
                    Some(&target),
                    spawn.position,
                    spawn.rotation,
                )?;
                Ok(())
            },
        );
    }

    fn on_region_changed(&self, transition: &Transition, from: &RegionName, to: &RegionName) {
        let player_id = transition.player_id;
        let epoch = transition.epoch;

        debug!(%player_id, %from, %to, "region changed");
        self.emit(LifecycleEvent::RegionChanged {
            player_id,
            from: from.clone(),
            to: to.clone(),
        });

        if self.config.announce_region_changes {
            let messenger = Arc::clone(&self.collab.messenger);
            let notice = Notice::RegionChange {
                player_id,
                from: from.clone(),
                to: to.clone(),
            };
            self.scheduler.schedule(
                player_id,
                epoch,
                self.config.region_announcement_delay(),
                ExecutionTarget::PlayerRegion,
                move || {
                    messenger.broadcast(&notice)?;
                    Ok(())
                },
            );
        }

        if self.config.first_visit_announcements {
            let already_seen = self
                .sessions
                .get(&player_id)
                .is_some_and(|s| s.seen_region_announcements.contains(to));
            if already_seen {
                return;
            }

            let messenger = Arc::clone(&self.collab.messenger);
            let sessions = Arc::clone(&self.sessions);
            let region = to.clone();
            self.scheduler.schedule(
                player_id,
                epoch,
                self.config.region_announcement_delay(),
                ExecutionTarget::PlayerRegion,
                move || {
                    // Recorded when sent, so a notice dropped by a quick
                    // second region change still fires next time.
                    if sessions.mark_region_announced(&player_id, epoch, &region) {
                        messenger.send(player_id, &Notice::FirstVisit { region })?;
                    }
                    Ok(())
                },
            );
        }
    }

    fn on_offline_leave(&self, transition: &Transition, last_region: &RegionName) {
        let player_id = transition.player_id;
        let played = transition.online_for(Instant::now());

        info!(%player_id, %last_region, played_secs = played.as_secs(), "player offline");

        let departure = Departure {
            last_seen_unix_ms: unix_millis(),
            played,
            last_region: last_region.clone(),
        };
        if let Err(error) = self.collab.directory.record_departure(player_id, &departure) {
            log_failure(player_id, &error, "departure record");
        }

        self.guard.clear(&player_id);
        self.scheduler.cancel_all(player_id);
        self.emit(LifecycleEvent::OfflineLeave { player_id });

        if self.config.force_spawn_on_login {
            self.schedule_position_rewrite(player_id);
        }
    }

    /// Overwrites the saved position once the host's own disconnect save
    /// has had time to finish.
    fn schedule_position_rewrite(&self, player_id: PlayerId) {
        let Some(records) = self.collab.records.clone() else {
            return;
        };
        let spawns = Arc::clone(&self.collab.spawns);
        let region = self.router.config().default_region.clone();

        self.scheduler
            .schedule_detached(self.config.position_rewrite_delay(), move || {
                let Some(spawn) = spawns.spawn(&region)? else {
                    debug!(%player_id, %region, "no stored spawn, saved position left alone");
                    return Ok(());
                };
                records.store(&PositionRecord::at_spawn(player_id, region, spawn))?;
                debug!(%player_id, "saved position rewritten to spawn");
                Ok(())
            });
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

fn log_failure(player_id: PlayerId, error: &CollaboratorError, what: &str) {
    warn!(%player_id, source = error.source_tag, %error, "{what} failed, skipping");
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
