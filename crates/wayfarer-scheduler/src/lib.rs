//! Session-scoped delayed actions for Wayfarer.
//!
//! Arrival announcements, welcome content, mail checks, deferred respawn
//! teleports, reward checks: all of them are "do this for player P in a
//! little while, unless P is gone by then". [`DelayedActionScheduler`]
//! is the one place that pattern lives.
//!
//! # Validity
//!
//! Every session-scoped action captures the session epoch it was
//! scheduled under. When the timer fires, and again on the region
//! context right before the action runs, the scheduler checks that the
//! player is still `Online` in that same epoch. If they disconnected,
//! reconnected, or are mid region change, the action is dropped without
//! an error.
//!
//! # Execution context
//!
//! Actions run on a region executor chosen at *execution* time, never at
//! scheduling time: by default the player's current region, since they
//! may have moved while the timer ran.
//!
//! ```ignore
//! let epoch = tracker.epoch_of(&player).unwrap();
//! let delay = Duration::from_secs(2);
//! scheduler.schedule(player, epoch, delay, ExecutionTarget::PlayerRegion, move || {
//!     messenger.send(player, &Notice::Welcome)?;
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};
use wayfarer_protocol::{PlayerId, RegionName};
use wayfarer_region::{Job, RegionError, RegionManager};
use wayfarer_session::{SessionError, SessionTracker};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Random jitter (0–max ms) added to the *first* run of a repeating
    /// action, so actions scheduled at the same instant (a burst of
    /// reconnects after a restart) do not stay in lockstep.
    pub repeat_jitter_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            repeat_jitter_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// Actions, targets, handles
// ---------------------------------------------------------------------------

/// Whatever an action wants to report when it fails.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// What every scheduled action returns. Errors are logged, never retried.
pub type ActionResult = Result<(), ActionError>;

type BoxedAction = Box<dyn FnOnce() -> ActionResult + Send + 'static>;

/// Where a session-scoped action runs once its delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// The region the player is in when the action fires.
    PlayerRegion,
    /// A fixed region, entered fresh when the action fires.
    Region(RegionName),
}

/// Identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a scheduled task.
///
/// Dropping the handle does NOT cancel the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    player_id: Option<PlayerId>,
    abort: AbortHandle,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The player the task is scoped to; `None` for detached tasks.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Stops the timer if it has not fired yet and stops counting it as
    /// pending. An action already handed to a region executor still runs
    /// (subject to its validity check).
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether the timer task has ended (fired, cancelled, or stopped).
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Why a scheduled action was not handed to a region.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The session the action was scheduled under is not current.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The target region's executor refused the job.
    #[error(transparent)]
    Region(#[from] RegionError),
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Cancellable one-shot and repeating actions, keyed by player.
///
/// Cheap to clone; clones share the same pending-task registry.
#[derive(Clone)]
pub struct DelayedActionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    sessions: Arc<SessionTracker>,
    regions: Arc<RegionManager>,
    config: SchedulerConfig,
    /// Timers not yet fired, per player. `None` marks a task whose abort
    /// handle is not registered yet (it was spawned a moment ago).
    pending: DashMap<PlayerId, HashMap<TaskId, Option<AbortHandle>>>,
}

impl DelayedActionScheduler {
    /// Creates a scheduler over the given session and region registries.
    /// Must be used inside a Tokio runtime.
    pub fn new(
        sessions: Arc<SessionTracker>,
        regions: Arc<RegionManager>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions,
                regions,
                config,
                pending: DashMap::new(),
            }),
        }
    }

    /// The session tracker actions are validated against.
    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.inner.sessions
    }

    /// The region registry actions are executed on.
    pub fn regions(&self) -> &Arc<RegionManager> {
        &self.inner.regions
    }

    /// Runs `action` once after `delay`, if `player_id` is still online
    /// in session `epoch` by then.
    pub fn schedule<F>(
        &self,
        player_id: PlayerId,
        epoch: u64,
        delay: Duration,
        target: ExecutionTarget,
        action: F,
    ) -> TaskHandle
    where
        F: FnOnce() -> ActionResult + Send + 'static,
    {
        let id = next_task_id();
        self.inner.track(player_id, id);

        // Owned by the future, so an abort before the first poll untracks too.
        let tracked = Tracked::new(&self.inner, player_id, id);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            drop(tracked);
            inner.dispatch(player_id, epoch, &target, Box::new(action));
        });

        let abort = task.abort_handle();
        self.inner.arm(player_id, id, abort.clone());
        trace!(
            %player_id,
            epoch,
            task = %id,
            delay_ms = delay.as_millis() as u64,
            "action scheduled"
        );

        TaskHandle {
            id,
            player_id: Some(player_id),
            abort,
        }
    }

    /// Runs `action` every `period` for as long as `player_id` stays in
    /// session `epoch`.
    ///
    /// The first run comes after `period` plus up to
    /// `repeat_jitter_ms` of random jitter. Runs that fall during a region
    /// change are skipped; the task ends for good once the session ends.
    /// A zero `period` is raised to one millisecond.
    pub fn schedule_repeating<F>(
        &self,
        player_id: PlayerId,
        epoch: u64,
        period: Duration,
        target: ExecutionTarget,
        action: F,
    ) -> TaskHandle
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        let period = if period.is_zero() {
            warn!(%player_id, "repeating action with zero period, using 1 ms");
            Duration::from_millis(1)
        } else {
            period
        };
        let id = next_task_id();
        self.inner.track(player_id, id);

        let inner = Arc::clone(&self.inner);
        let action = Arc::new(action);
        let first = period + self.inner.jitter();
        let tracked = Tracked::new(&self.inner, player_id, id);
        let task = tokio::spawn(async move {
            let _tracked = tracked;
            let mut next = Instant::now() + first;
            loop {
                time::sleep_until(next).await;
                match inner.sessions.require_current(&player_id, epoch) {
                    Ok(_) => {
                        let action = Arc::clone(&action);
                        inner.dispatch(player_id, epoch, &target, Box::new(move || action()));
                    }
                    Err(SessionError::NotOnline(_)) => {
                        trace!(
                            %player_id,
                            task = %id,
                            "repeating action skipped during region change"
                        );
                    }
                    Err(reason) => {
                        debug!(
                            %player_id,
                            task = %id,
                            %reason,
                            "repeating action ended with session"
                        );
                        break;
                    }
                }
                next += period;
            }
        });

        let abort = task.abort_handle();
        self.inner.arm(player_id, id, abort.clone());

        TaskHandle {
            id,
            player_id: Some(player_id),
            abort,
        }
    }

    /// Runs `action` after `delay` on the blocking pool, with no session
    /// attached.
    ///
    /// For work that must happen after a player is gone (rewriting their
    /// persisted position once the host's own save has finished). Not
    /// affected by [`cancel_all`](Self::cancel_all).
    pub fn schedule_detached<F>(&self, delay: Duration, action: F) -> TaskHandle
    where
        F: FnOnce() -> ActionResult + Send + 'static,
    {
        let id = next_task_id();
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            match tokio::task::spawn_blocking(action).await {
                Ok(Ok(())) => trace!(task = %id, "detached action finished"),
                Ok(Err(error)) => warn!(task = %id, %error, "detached action failed"),
                Err(join) if join.is_panic() => {
                    tracing::error!(task = %id, "detached action panicked")
                }
                Err(_) => debug!(task = %id, "detached action cancelled"),
            }
        });

        TaskHandle {
            id,
            player_id: None,
            abort: task.abort_handle(),
        }
    }

    /// Cancels every pending timer for `player_id`. Returns how many were
    /// cancelled.
    ///
    /// Best effort: a timer that fires concurrently with this call is
    /// still caught by the epoch check.
    pub fn cancel_all(&self, player_id: PlayerId) -> usize {
        let Some((_, tasks)) = self.inner.pending.remove(&player_id) else {
            return 0;
        };
        let mut cancelled = 0;
        for abort in tasks.values().flatten() {
            abort.abort();
            cancelled += 1;
        }
        if cancelled > 0 {
            debug!(%player_id, cancelled, "pending actions cancelled");
        }
        cancelled
    }

    /// Number of timers still pending for `player_id`.
    pub fn pending(&self, player_id: &PlayerId) -> usize {
        self.inner.pending.get(player_id).map_or(0, |tasks| tasks.len())
    }
}

impl Inner {
    fn track(&self, player_id: PlayerId, id: TaskId) {
        self.pending.entry(player_id).or_default().insert(id, None);
    }

    /// Registers the abort handle, unless the task already finished and
    /// untracked itself.
    fn arm(&self, player_id: PlayerId, id: TaskId, abort: AbortHandle) {
        if let Some(mut tasks) = self.pending.get_mut(&player_id) {
            if let Some(slot) = tasks.get_mut(&id) {
                *slot = Some(abort);
            }
        }
    }

    fn untrack(&self, player_id: PlayerId, id: TaskId) {
        if let Some(mut tasks) = self.pending.get_mut(&player_id) {
            tasks.remove(&id);
        }
        self.pending.remove_if(&player_id, |_, tasks| tasks.is_empty());
    }

    fn jitter(&self) -> Duration {
        if self.config.repeat_jitter_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::rng().random_range(0..=self.config.repeat_jitter_ms);
        Duration::from_millis(ms)
    }

    /// Validates the session and hands the action to its region.
    fn dispatch(
        &self,
        player_id: PlayerId,
        epoch: u64,
        target: &ExecutionTarget,
        action: BoxedAction,
    ) {
        let region = match self.resolve(player_id, epoch, target) {
            Ok(region) => region,
            Err(reason) => {
                debug!(%player_id, epoch, %reason, "dropping scheduled action");
                return;
            }
        };

        let sessions = Arc::clone(&self.sessions);
        let job_region = region.clone();
        let job: Job = Box::new(move || {
            // The player may have left while the job sat in the queue.
            if let Err(reason) = sessions.require_current(&player_id, epoch) {
                debug!(%player_id, epoch, %reason, "dropping queued action");
                return;
            }
            if let Err(error) = action() {
                warn!(%player_id, region = %job_region, %error, "scheduled action failed");
            }
        });

        if let Err(reason) = self.regions.ensure(&region).execute(job) {
            let reason = ScheduleError::from(reason);
            debug!(%player_id, %region, %reason, "dropping scheduled action");
        }
    }

    fn resolve(
        &self,
        player_id: PlayerId,
        epoch: u64,
        target: &ExecutionTarget,
    ) -> Result<RegionName, ScheduleError> {
        let current = self.sessions.require_current(&player_id, epoch)?;
        Ok(match target {
            ExecutionTarget::PlayerRegion => current,
            ExecutionTarget::Region(region) => region.clone(),
        })
    }
}

/// Keeps a task in the pending set for as long as its timer future lives.
///
/// Dropped when the timer fires, when the task ends, and when the future
/// is torn down by [`TaskHandle::cancel`] or [`DelayedActionScheduler::cancel_all`].
struct Tracked {
    inner: Arc<Inner>,
    player_id: PlayerId,
    id: TaskId,
}

impl Tracked {
    fn new(inner: &Arc<Inner>, player_id: PlayerId, id: TaskId) -> Self {
        Self {
            inner: Arc::clone(inner),
            player_id,
            id,
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.inner.untrack(self.player_id, self.id);
    }
}

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}
