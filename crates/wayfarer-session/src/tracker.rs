//! The session tracker: authoritative presence for every player.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Feeding each raw notification through [`transition`]
//! - Creating a session on `OnlineJoin` and destroying it on `OfflineLeave`
//! - Handing out session epochs so stale scheduled work can be detected
//! - Reconciling players stuck mid region change
//!
//! # Concurrency note
//!
//! Region-Leave and Region-Enter for the *same* player routinely arrive
//! from two region contexts at nearly the same moment. Every transition
//! runs inside that player's `DashMap` entry, so the read of the old
//! state and the write of the new one are one atomic step per player.
//! Unrelated players live in other entries and proceed in parallel; there
//! is no tracker-wide lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use wayfarer_protocol::{PlayerId, RegionName};

use crate::{
    PlayerSession, PresenceEvent, SessionConfig, SessionError, SessionState, TransitionKind,
    transition,
};

/// Process-wide epoch source. Every new session takes the next value, so
/// a player who reconnects always gets a larger epoch than before.
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// A semantic transition produced by the tracker, stamped with the
/// session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub player_id: PlayerId,
    /// Epoch of the session this transition belongs to. For
    /// `OfflineLeave` it is the epoch of the session that just ended.
    pub epoch: u64,
    /// When that session came online.
    pub online_since: Instant,
    pub kind: TransitionKind,
}

impl Transition {
    /// Time spent online in this session, as of `now`.
    pub fn online_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.online_since)
    }
}

/// Tracks every live player session.
///
/// ## Lifecycle
///
/// ```text
/// observe(Enter) ──→ [Online] ──observe(Leave)──→ [RegionChanging]
///                       ↑ │                            │   │
///                       │ └────── observe(Enter) ←─────┘   │
///                       │                                  │
///            observe(Disconnect) / reconcile_stale() ←─────┘
///                       │
///                       ▼
///                  (removed)
/// ```
#[derive(Default)]
pub struct SessionTracker {
    /// Live sessions, keyed by player. Offline players have no entry.
    sessions: DashMap<PlayerId, PlayerSession>,

    config: SessionConfig,
}

impl SessionTracker {
    /// Creates an empty tracker.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config: config.validated(),
        }
    }

    /// The tracker's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Applies one presence notification for `player_id`.
    ///
    /// Returns the semantic transition it produced, if any. Duplicate and
    /// out-of-order notifications return `None` and change nothing.
    pub fn observe(&self, player_id: PlayerId, event: PresenceEvent) -> Option<Transition> {
        let now = Instant::now();

        match self.sessions.entry(player_id) {
            Entry::Vacant(slot) => {
                let (next, kind) = transition(&SessionState::Offline, &event, now);
                let (SessionState::Online { region }, Some(kind)) = (next, kind) else {
                    tracing::trace!(%player_id, ?event, "ignoring notification for offline player");
                    return None;
                };

                let epoch = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
                slot.insert(PlayerSession::new(player_id, region.clone(), epoch, now));
                tracing::info!(%player_id, %region, epoch, "session opened");

                Some(Transition {
                    player_id,
                    epoch,
                    online_since: now,
                    kind,
                })
            }
            Entry::Occupied(mut slot) => {
                let (next, kind) = transition(&slot.get().state, &event, now);
                let epoch = slot.get().epoch;
                let online_since = slot.get().online_since;

                if matches!(next, SessionState::Offline) {
                    slot.remove();
                    tracing::info!(%player_id, epoch, "session closed");
                } else {
                    let session = slot.get_mut();
                    if let Some(TransitionKind::RegionChanged { from, .. }) = &kind {
                        session.last_region = Some(from.clone());
                    }
                    tracing::trace!(
                        %player_id,
                        from = %session.state,
                        to = %next,
                        "presence updated"
                    );
                    session.state = next;
                }

                kind.map(|kind| Transition {
                    player_id,
                    epoch,
                    online_since,
                    kind,
                })
            }
        }
    }

    /// Shorthand for `observe(player_id, PresenceEvent::Enter(region))`.
    pub fn enter(&self, player_id: PlayerId, region: RegionName) -> Option<Transition> {
        self.observe(player_id, PresenceEvent::Enter(region))
    }

    /// Shorthand for `observe(player_id, PresenceEvent::Leave(region))`.
    pub fn leave(&self, player_id: PlayerId, region: RegionName) -> Option<Transition> {
        self.observe(player_id, PresenceEvent::Leave(region))
    }

    /// Shorthand for `observe(player_id, PresenceEvent::Disconnect)`.
    pub fn disconnect(&self, player_id: PlayerId) -> Option<Transition> {
        self.observe(player_id, PresenceEvent::Disconnect)
    }

    /// Declares offline every player who has been `RegionChanging` for
    /// longer than the configured leave timeout.
    ///
    /// Call this periodically. Returns one `OfflineLeave` transition per
    /// player reconciled.
    pub fn reconcile_stale(&self) -> Vec<Transition> {
        self.stale_leaves()
            .into_iter()
            .filter_map(|(player_id, event)| {
                let reconciled = self.observe(player_id, event);
                if reconciled.is_some() {
                    tracing::info!(
                        %player_id,
                        "no region entered after leave, treating as offline"
                    );
                }
                reconciled
            })
            .collect()
    }

    /// Players stuck `RegionChanging` past the leave timeout, each paired
    /// with the `LeaveTimedOut` event that would reconcile them.
    ///
    /// Nothing is changed here; a Region-Enter that lands before the event
    /// is observed still wins.
    pub fn stale_leaves(&self) -> Vec<(PlayerId, PresenceEvent)> {
        let Some(cutoff) = Instant::now().checked_sub(self.config.leave_timeout()) else {
            return Vec::new();
        };

        // Collect first: `observe` needs the entry lock the iterator holds.
        self.sessions
            .iter()
            .filter(|entry| {
                matches!(
                    entry.state,
                    SessionState::RegionChanging { since, .. } if since <= cutoff
                )
            })
            .map(|entry| (*entry.key(), PresenceEvent::LeaveTimedOut { cutoff }))
            .collect()
    }

    /// A snapshot of the player's session, if they have one.
    pub fn get(&self, player_id: &PlayerId) -> Option<PlayerSession> {
        self.sessions.get(player_id).map(|s| s.value().clone())
    }

    /// Returns `true` if the player is `Online` (not mid region change).
    pub fn is_online(&self, player_id: &PlayerId) -> bool {
        self.sessions
            .get(player_id)
            .is_some_and(|s| s.state.is_online())
    }

    /// Returns `true` if the player is `Online` in session `epoch`.
    pub fn is_current(&self, player_id: &PlayerId, epoch: u64) -> bool {
        self.require_current(player_id, epoch).is_ok()
    }

    /// Checks that the player is `Online` in session `epoch` and returns
    /// their current region.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: no live session
    /// - [`SessionError::StaleEpoch`]: a different session is live
    /// - [`SessionError::NotOnline`]: the right session, mid region change
    pub fn require_current(
        &self,
        player_id: &PlayerId,
        epoch: u64,
    ) -> Result<RegionName, SessionError> {
        let session = self
            .sessions
            .get(player_id)
            .ok_or(SessionError::NotFound(*player_id))?;

        if session.epoch != epoch {
            return Err(SessionError::StaleEpoch {
                player_id: *player_id,
                expected: epoch,
                actual: session.epoch,
            });
        }
        match &session.state {
            SessionState::Online { region } => Ok(region.clone()),
            _ => Err(SessionError::NotOnline(*player_id)),
        }
    }

    /// The epoch of the player's live session.
    pub fn epoch_of(&self, player_id: &PlayerId) -> Option<u64> {
        self.sessions.get(player_id).map(|s| s.epoch)
    }

    /// The player's current (or just-vacated) region.
    pub fn current_region(&self, player_id: &PlayerId) -> Option<RegionName> {
        self.sessions
            .get(player_id)
            .and_then(|s| s.current_region().cloned())
    }

    /// Records that the one-time announcement for `region` fired in
    /// session `epoch`.
    ///
    /// Returns `true` the first time per session, `false` if it was
    /// already recorded or the session is gone or has moved on.
    pub fn mark_region_announced(
        &self,
        player_id: &PlayerId,
        epoch: u64,
        region: &RegionName,
    ) -> bool {
        match self.sessions.get_mut(player_id) {
            Some(mut session) if session.epoch == epoch => {
                session.seen_region_announcements.insert(region.clone())
            }
            _ => false,
        }
    }

    /// Players currently `Online`.
    pub fn online_players(&self) -> Vec<PlayerId> {
        self.sessions
            .iter()
            .filter(|entry| entry.state.is_online())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Number of live sessions (Online or RegionChanging).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
