//! The presence state machine, as a pure function.
//!
//! [`transition`] takes the current [`SessionState`] and one
//! [`PresenceEvent`] and returns the next state plus, at most, one
//! semantic [`TransitionKind`]. No I/O, no clocks beyond the `now` it is
//! handed, no locking; the tracker supplies all of that.

use tokio::time::Instant;
use wayfarer_protocol::RegionName;

use crate::SessionState;

/// A raw presence notification for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Host: player was added to `region`.
    Enter(RegionName),

    /// Host: player was removed from `region`.
    Leave(RegionName),

    /// Host: connection closed. May repeat.
    Disconnect,

    /// Reconciliation sweep: a player who has been `RegionChanging` since
    /// at or before `cutoff` is declared offline. Carrying the cutoff
    /// (rather than deciding in the sweep) means a Region-Enter that lands
    /// between the sweep's scan and this event still wins.
    LeaveTimedOut { cutoff: Instant },
}

/// The semantic outcome of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// Offline → Online in `region`.
    OnlineJoin { region: RegionName },

    /// Online (or changing) → Online in a different region.
    RegionChanged { from: RegionName, to: RegionName },

    /// Live → Offline. `last_region` is where the player was last seen.
    OfflineLeave { last_region: RegionName },
}

/// Applies one presence event to a state.
///
/// | state              | event                | next                  | emits                    |
/// |--------------------|----------------------|-----------------------|--------------------------|
/// | Offline            | Enter(r)             | Online{r}             | OnlineJoin{r}            |
/// | Offline            | anything else        | Offline               | -                        |
/// | Online{r}          | Leave(r)             | RegionChanging{r}     | -                        |
/// | Online{r}          | Leave(x), x ≠ r      | Online{r}             | - (stale leave)          |
/// | Online{r}          | Enter(r)             | Online{r}             | - (redundant re-entry)   |
/// | Online{r}          | Enter(x), x ≠ r      | Online{x}             | RegionChanged{r, x}      |
/// | RegionChanging{f}  | Leave(_)             | unchanged             | - (idempotent)           |
/// | RegionChanging{f}  | Enter(t)             | Online{t}             | RegionChanged{f, t}      |
/// | Online / Changing  | Disconnect           | Offline               | OfflineLeave             |
/// | RegionChanging{f}  | LeaveTimedOut, old   | Offline               | OfflineLeave             |
/// | otherwise          | LeaveTimedOut        | unchanged             | -                        |
pub fn transition(
    state: &SessionState,
    event: &PresenceEvent,
    now: Instant,
) -> (SessionState, Option<TransitionKind>) {
    match (state, event) {
        (SessionState::Offline, PresenceEvent::Enter(region)) => (
            SessionState::Online {
                region: region.clone(),
            },
            Some(TransitionKind::OnlineJoin {
                region: region.clone(),
            }),
        ),
        (SessionState::Offline, _) => (SessionState::Offline, None),

        (SessionState::Online { region }, PresenceEvent::Leave(vacated)) => {
            if region == vacated {
                (
                    SessionState::RegionChanging {
                        from: vacated.clone(),
                        since: now,
                    },
                    None,
                )
            } else {
                // Late leave from a region the player already moved out of.
                (state.clone(), None)
            }
        }
        (SessionState::Online { region }, PresenceEvent::Enter(entered)) => {
            if region == entered {
                (state.clone(), None)
            } else {
                (
                    SessionState::Online {
                        region: entered.clone(),
                    },
                    Some(TransitionKind::RegionChanged {
                        from: region.clone(),
                        to: entered.clone(),
                    }),
                )
            }
        }

        (SessionState::RegionChanging { .. }, PresenceEvent::Leave(_)) => (state.clone(), None),
        (SessionState::RegionChanging { from, .. }, PresenceEvent::Enter(to)) => (
            SessionState::Online { region: to.clone() },
            Some(TransitionKind::RegionChanged {
                from: from.clone(),
                to: to.clone(),
            }),
        ),

        (SessionState::Online { region }, PresenceEvent::Disconnect)
        | (SessionState::RegionChanging { from: region, .. }, PresenceEvent::Disconnect) => (
            SessionState::Offline,
            Some(TransitionKind::OfflineLeave {
                last_region: region.clone(),
            }),
        ),

        (SessionState::RegionChanging { from, since }, PresenceEvent::LeaveTimedOut { cutoff })
            if *since <= *cutoff =>
        {
            (
                SessionState::Offline,
                Some(TransitionKind::OfflineLeave {
                    last_region: from.clone(),
                }),
            )
        }
        (_, PresenceEvent::LeaveTimedOut { .. }) => (state.clone(), None),
    }
}

#[cfg(test)]
mod tests {
    //! The table in [`transition`]'s docs, row by row.

    use std::time::Duration;

    use super::*;

    fn r(name: &str) -> RegionName {
        RegionName::from(name)
    }

    fn online(name: &str) -> SessionState {
        SessionState::Online { region: r(name) }
    }

    fn changing(name: &str, since: Instant) -> SessionState {
        SessionState::RegionChanging { from: r(name), since }
    }

    #[test]
    fn test_transition_offline_enter_joins() {
        let now = Instant::now();
        let (next, emitted) =
            transition(&SessionState::Offline, &PresenceEvent::Enter(r("A")), now);
        assert_eq!(next, online("A"));
        assert_eq!(emitted, Some(TransitionKind::OnlineJoin { region: r("A") }));
    }

    #[test]
    fn test_transition_offline_ignores_leave_disconnect_and_timeout() {
        let now = Instant::now();
        for event in [
            PresenceEvent::Leave(r("A")),
            PresenceEvent::Disconnect,
            PresenceEvent::LeaveTimedOut { cutoff: now },
        ] {
            let (next, emitted) = transition(&SessionState::Offline, &event, now);
            assert_eq!(next, SessionState::Offline, "event {event:?}");
            assert_eq!(emitted, None, "event {event:?}");
        }
    }

    #[test]
    fn test_transition_online_leave_marks_pending_without_emitting() {
        let now = Instant::now();
        let (next, emitted) = transition(&online("A"), &PresenceEvent::Leave(r("A")), now);
        assert_eq!(next, changing("A", now));
        assert_eq!(emitted, None);
    }

    #[test]
    fn test_transition_online_leave_of_other_region_is_ignored() {
        let now = Instant::now();
        let (next, emitted) = transition(&online("B"), &PresenceEvent::Leave(r("A")), now);
        assert_eq!(next, online("B"), "a late leave must not undo the move to B");
        assert_eq!(emitted, None);
    }

    #[test]
    fn test_transition_second_leave_keeps_original_pending_leave() {
        let first = Instant::now();
        let later = first + Duration::from_millis(50);
        let state = changing("A", first);

        let (next, emitted) = transition(&state, &PresenceEvent::Leave(r("A")), later);

        assert_eq!(next, state, "pending leave is set, not toggled or restamped");
        assert_eq!(emitted, None);
    }

    #[test]
    fn test_transition_changing_enter_emits_region_changed() {
        let now = Instant::now();
        let (next, emitted) = transition(&changing("A", now), &PresenceEvent::Enter(r("B")), now);
        assert_eq!(next, online("B"));
        assert_eq!(
            emitted,
            Some(TransitionKind::RegionChanged { from: r("A"), to: r("B") })
        );
    }

    #[test]
    fn test_transition_changing_reenter_same_region_still_emits() {
        let now = Instant::now();
        let (_, emitted) = transition(&changing("A", now), &PresenceEvent::Enter(r("A")), now);
        assert_eq!(
            emitted,
            Some(TransitionKind::RegionChanged { from: r("A"), to: r("A") })
        );
    }

    #[test]
    fn test_transition_online_enter_other_region_falls_back_to_change() {
        let now = Instant::now();
        let (next, emitted) = transition(&online("A"), &PresenceEvent::Enter(r("B")), now);
        assert_eq!(next, online("B"));
        assert_eq!(
            emitted,
            Some(TransitionKind::RegionChanged { from: r("A"), to: r("B") })
        );
    }

    #[test]
    fn test_transition_online_enter_same_region_is_ignored() {
        let now = Instant::now();
        let (next, emitted) = transition(&online("A"), &PresenceEvent::Enter(r("A")), now);
        assert_eq!(next, online("A"));
        assert_eq!(emitted, None);
    }

    #[test]
    fn test_transition_disconnect_from_online_and_changing_leaves() {
        let now = Instant::now();
        for (state, last) in [(online("A"), "A"), (changing("B", now), "B")] {
            let (next, emitted) = transition(&state, &PresenceEvent::Disconnect, now);
            assert_eq!(next, SessionState::Offline);
            assert_eq!(
                emitted,
                Some(TransitionKind::OfflineLeave { last_region: r(last) })
            );
        }
    }

    #[test]
    fn test_transition_timeout_only_applies_to_old_pending_leave() {
        let since = Instant::now();
        let state = changing("A", since);

        let before = since - Duration::from_millis(1);
        let (next, emitted) =
            transition(&state, &PresenceEvent::LeaveTimedOut { cutoff: before }, since);
        assert_eq!(next, state);
        assert_eq!(emitted, None);

        let (next, emitted) =
            transition(&state, &PresenceEvent::LeaveTimedOut { cutoff: since }, since);
        assert_eq!(next, SessionState::Offline);
        assert_eq!(emitted, Some(TransitionKind::OfflineLeave { last_region: r("A") }));
    }

    #[test]
    fn test_transition_timeout_ignores_online_player() {
        let now = Instant::now();
        let (next, emitted) =
            transition(&online("A"), &PresenceEvent::LeaveTimedOut { cutoff: now }, now);
        assert_eq!(next, online("A"));
        assert_eq!(emitted, None);
    }
}
