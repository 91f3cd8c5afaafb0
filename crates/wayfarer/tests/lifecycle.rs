//! End-to-end lifecycle tests: host notifications in, collaborator calls
//! and lifecycle events out.
//!
//! All collaborators are recording doubles. Time is paused, so every
//! delay is stepped explicitly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use wayfarer::prelude::*;
use wayfarer::{LifecycleConfig, OpenAdmission, SpawnOnJoin};

// =========================================================================
// Test doubles
// =========================================================================

#[derive(Default)]
struct RecordingDirectory {
    joined: Mutex<HashSet<PlayerId>>,
    departures: Mutex<Vec<(PlayerId, Departure)>>,
    rewards: Mutex<Vec<(PlayerId, Duration)>>,
    unread: usize,
    history_broken: bool,
}

impl RecordingDirectory {
    fn departures(&self) -> Vec<(PlayerId, Departure)> {
        self.departures.lock().unwrap().clone()
    }

    fn rewards(&self) -> Vec<(PlayerId, Duration)> {
        self.rewards.lock().unwrap().clone()
    }
}

impl PlayerDirectory for RecordingDirectory {
    fn has_joined_before(&self, player_id: PlayerId) -> Result<bool, CollaboratorError> {
        if self.history_broken {
            return Err(CollaboratorError::new("directory", "history table locked"));
        }
        Ok(self.joined.lock().unwrap().contains(&player_id))
    }

    fn record_first_join(&self, player_id: PlayerId) -> Result<(), CollaboratorError> {
        self.joined.lock().unwrap().insert(player_id);
        Ok(())
    }

    fn record_departure(
        &self,
        player_id: PlayerId,
        departure: &Departure,
    ) -> Result<(), CollaboratorError> {
        self.departures.lock().unwrap().push((player_id, departure.clone()));
        Ok(())
    }

    fn unread_mail(&self, _: PlayerId) -> Result<usize, CollaboratorError> {
        Ok(self.unread)
    }

    fn check_rewards(
        &self,
        player_id: PlayerId,
        played: Duration,
    ) -> Result<(), CollaboratorError> {
        self.rewards.lock().unwrap().push((player_id, played));
        Ok(())
    }
}

/// Records every notice; broadcasts are recorded with no recipient.
#[derive(Default)]
struct RecordingMessenger {
    notices: Mutex<Vec<(Option<PlayerId>, Notice)>>,
}

impl RecordingMessenger {
    fn notices(&self) -> Vec<(Option<PlayerId>, Notice)> {
        self.notices.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Notice) -> bool) -> usize {
        self.notices().iter().filter(|(_, n)| pred(n)).count()
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, player_id: PlayerId, notice: &Notice) -> Result<(), CollaboratorError> {
        self.notices.lock().unwrap().push((Some(player_id), notice.clone()));
        Ok(())
    }

    fn broadcast(&self, notice: &Notice) -> Result<(), CollaboratorError> {
        self.notices.lock().unwrap().push((None, notice.clone()));
        Ok(())
    }
}

struct FixedSpawns(HashMap<RegionName, SpawnPoint>);

impl SpawnStore for FixedSpawns {
    fn spawn(&self, region: &RegionName) -> Result<Option<SpawnPoint>, CollaboratorError> {
        Ok(self.0.get(region).copied())
    }
}

#[derive(Default)]
struct RecordingTeleporter {
    issued: Mutex<Vec<(PlayerId, Option<RegionName>, Position)>>,
}

impl RecordingTeleporter {
    fn issued(&self) -> Vec<(PlayerId, Option<RegionName>, Position)> {
        self.issued.lock().unwrap().clone()
    }
}

impl Teleporter for RecordingTeleporter {
    fn issue_teleport(
        &self,
        player_id: PlayerId,
        target_region: Option<&RegionName>,
        position: Position,
        _: Rotation,
    ) -> Result<(), CollaboratorError> {
        self.issued
            .lock()
            .unwrap()
            .push((player_id, target_region.cloned(), position));
        Ok(())
    }
}

/// Forwards every stored record to the test.
struct ChannelRecords(mpsc::UnboundedSender<PositionRecord>);

impl PositionRecords for ChannelRecords {
    fn load(&self, _: PlayerId) -> Result<Option<PositionRecord>, CollaboratorError> {
        Ok(None)
    }

    fn store(&self, record: &PositionRecord) -> Result<(), CollaboratorError> {
        self.0
            .send(record.clone())
            .map_err(|_| CollaboratorError::new("position-records", "test receiver gone"))
    }
}

struct DenyList(&'static str);

impl Admission for DenyList {
    fn admit(
        &self,
        _: PlayerId,
        username: &str,
    ) -> Result<Result<(), Rejection>, CollaboratorError> {
        if username == self.0 {
            Ok(Err(Rejection::new("You are banned from this server.")))
        } else {
            Ok(Ok(()))
        }
    }
}

struct BrokenAdmission;

impl Admission for BrokenAdmission {
    fn admit(&self, _: PlayerId, _: &str) -> Result<Result<(), Rejection>, CollaboratorError> {
        Err(CollaboratorError::new("bans", "ban list unreachable"))
    }
}

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    wayfarer: Wayfarer,
    directory: Arc<RecordingDirectory>,
    messenger: Arc<RecordingMessenger>,
    teleporter: Arc<RecordingTeleporter>,
}

impl Harness {
    fn coordinator(&self) -> &LifecycleCoordinator {
        self.wayfarer.coordinator()
    }
}

fn base_config() -> WayfarerConfig {
    let mut config = WayfarerConfig::default();
    config.respawn.default_region = RegionName::from("Overworld");
    config.scheduler.repeat_jitter_ms = 0;
    config
}

fn harness_with(config: WayfarerConfig, directory: RecordingDirectory) -> Harness {
    let directory = Arc::new(directory);
    let messenger = Arc::new(RecordingMessenger::default());
    let teleporter = Arc::new(RecordingTeleporter::default());
    let mut spawns = HashMap::new();
    spawns.insert(RegionName::from("Overworld"), SpawnPoint::new(100.0, 64.0, 200.0, 90.0));

    let wayfarer = Wayfarer::builder()
        .config(config)
        .directory(Arc::clone(&directory))
        .messenger(Arc::clone(&messenger))
        .spawns(Arc::new(FixedSpawns(spawns)))
        .teleporter(Arc::clone(&teleporter))
        .build()
        .unwrap();

    Harness {
        wayfarer,
        directory,
        messenger,
        teleporter,
    }
}

fn harness() -> Harness {
    harness_with(
        base_config(),
        RecordingDirectory {
            unread: 2,
            ..RecordingDirectory::default()
        },
    )
}

fn p(id: u64) -> PlayerId {
    PlayerId(id)
}

fn r(name: &str) -> RegionName {
    RegionName::from(name)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn step(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

fn drain(events: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_join_schedules_arrival_welcome_and_mail_in_order() {
    let h = harness();
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("Overworld"));
    assert_eq!(
        drain(&mut events),
        vec![LifecycleEvent::OnlineJoin {
            player_id: p(1),
            is_first_join: true
        }]
    );

    step(500).await;
    assert_eq!(
        h.messenger.notices(),
        vec![(
            None,
            Notice::Arrival {
                player_id: p(1),
                first_join: true
            }
        )]
    );

    step(500).await;
    assert_eq!(h.messenger.count(|n| *n == Notice::Welcome), 1);
    assert_eq!(h.messenger.count(|n| matches!(n, Notice::UnreadMail { .. })), 0);

    step(1_000).await;
    assert_eq!(
        h.messenger.notices().last(),
        Some(&(Some(p(1)), Notice::UnreadMail { count: 2 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_returning_player_is_not_first_join() {
    let h = harness();
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("Overworld"));
    h.coordinator().on_disconnect(p(1));
    h.coordinator().on_region_enter(p(1), r("Overworld"));

    let joins: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            LifecycleEvent::OnlineJoin { is_first_join, .. } => Some(is_first_join),
            _ => None,
        })
        .collect();
    assert_eq!(joins, vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_join_history_failure_still_joins_as_returning() {
    let h = harness_with(
        base_config(),
        RecordingDirectory {
            history_broken: true,
            ..RecordingDirectory::default()
        },
    );
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("Overworld"));
    step(1_000).await;

    assert_eq!(
        drain(&mut events),
        vec![LifecycleEvent::OnlineJoin {
            player_id: p(1),
            is_first_join: false
        }]
    );
    assert_eq!(h.messenger.count(|n| *n == Notice::Welcome), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_mail_notice_without_unread_mail() {
    let h = harness_with(base_config(), RecordingDirectory::default());
    h.coordinator().on_region_enter(p(1), r("Overworld"));
    step(3_000).await;
    assert_eq!(h.messenger.count(|n| matches!(n, Notice::UnreadMail { .. })), 0);
}

// =========================================================================
// Region changes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_enter_leave_enter_is_one_join_and_one_change() {
    let h = harness();
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("A"));
    h.coordinator().on_region_leave(p(1), r("A"));
    h.coordinator().on_region_enter(p(1), r("B"));

    assert_eq!(
        drain(&mut events),
        vec![
            LifecycleEvent::OnlineJoin {
                player_id: p(1),
                is_first_join: true
            },
            LifecycleEvent::RegionChanged {
                player_id: p(1),
                from: r("A"),
                to: r("B")
            },
        ]
    );

    step(500).await;
    let notices = h.messenger.notices();
    assert!(notices.contains(&(
        None,
        Notice::RegionChange {
            player_id: p(1),
            from: r("A"),
            to: r("B")
        }
    )));
    assert!(notices.contains(&(Some(p(1)), Notice::FirstVisit { region: r("B") })));
}

#[tokio::test(start_paused = true)]
async fn test_first_visit_notice_fires_once_per_region_per_session() {
    let h = harness();
    let c = h.coordinator();

    c.on_region_enter(p(1), r("A"));
    for (from, to) in [("A", "B"), ("B", "A"), ("A", "B")] {
        c.on_region_leave(p(1), r(from));
        c.on_region_enter(p(1), r(to));
        step(600).await;
    }

    let first_visits: Vec<_> = h
        .messenger
        .notices()
        .into_iter()
        .filter_map(|(_, n)| match n {
            Notice::FirstVisit { region } => Some(region),
            _ => None,
        })
        .collect();
    assert_eq!(first_visits, vec![r("B")], "join region A counts as seen");
    assert_eq!(h.messenger.count(|n| matches!(n, Notice::RegionChange { .. })), 3);
}

#[tokio::test(start_paused = true)]
async fn test_region_announcements_can_be_disabled() {
    let mut config = base_config();
    config.lifecycle = LifecycleConfig {
        announce_region_changes: false,
        first_visit_announcements: false,
        ..LifecycleConfig::default()
    };
    let h = harness_with(config, RecordingDirectory::default());

    h.coordinator().on_region_enter(p(1), r("A"));
    h.coordinator().on_region_enter(p(1), r("B"));
    step(1_000).await;

    assert_eq!(h.messenger.count(|n| matches!(n, Notice::RegionChange { .. })), 0);
    assert_eq!(h.messenger.count(|n| matches!(n, Notice::FirstVisit { .. })), 0);
}

// =========================================================================
// Leave
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_double_disconnect_is_one_leave() {
    let h = harness();
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("A"));
    step(90_000).await;
    h.coordinator().on_disconnect(p(1));
    h.coordinator().on_disconnect(p(1));

    let leaves = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, LifecycleEvent::OfflineLeave { .. }))
        .count();
    assert_eq!(leaves, 1);

    let departures = h.directory.departures();
    assert_eq!(departures.len(), 1);
    assert_eq!(departures[0].0, p(1));
    assert_eq!(departures[0].1.played, Duration::from_secs(90));
    assert_eq!(departures[0].1.last_region, r("A"));
}

#[tokio::test(start_paused = true)]
async fn test_leave_then_disconnect_is_leave_without_change() {
    let h = harness();
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("A"));
    h.coordinator().on_region_leave(p(1), r("A"));
    h.coordinator().on_disconnect(p(1));

    assert_eq!(
        drain(&mut events),
        vec![
            LifecycleEvent::OnlineJoin {
                player_id: p(1),
                is_first_join: true
            },
            LifecycleEvent::OfflineLeave { player_id: p(1) },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_join_side_effects() {
    let h = harness();

    h.coordinator().on_region_enter(p(1), r("A"));
    step(300).await;
    h.coordinator().on_disconnect(p(1));
    assert_eq!(h.coordinator().scheduler().pending(&p(1)), 0);

    step(3_000).await;
    assert!(h.messenger.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_runs_only_new_session_actions() {
    let h = harness();

    h.coordinator().on_region_enter(p(1), r("A"));
    step(300).await;
    h.coordinator().on_disconnect(p(1));
    h.coordinator().on_region_enter(p(1), r("A"));
    step(3_000).await;

    assert_eq!(h.messenger.count(|n| matches!(n, Notice::Arrival { .. })), 1);
    assert_eq!(h.messenger.count(|n| *n == Notice::Welcome), 1);
}

#[tokio::test(start_paused = true)]
async fn test_force_spawn_rewrites_position_after_host_save() {
    let mut config = base_config();
    config.lifecycle.force_spawn_on_login = true;
    let (tx, mut rewritten) = mpsc::unbounded_channel();

    let wayfarer = Wayfarer::builder()
        .config(config)
        .directory(Arc::new(RecordingDirectory::default()))
        .messenger(Arc::new(RecordingMessenger::default()))
        .spawns(Arc::new(FixedSpawns(HashMap::from([(
            r("Overworld"),
            SpawnPoint::new(100.0, 64.0, 200.0, 90.0),
        )]))))
        .teleporter(Arc::new(RecordingTeleporter::default()))
        .position_records(Arc::new(ChannelRecords(tx)))
        .build()
        .unwrap();
    let c = wayfarer.coordinator();

    c.on_region_enter(p(4), r("Dungeon"));
    c.on_disconnect(p(4));

    step(1_999).await;
    assert!(rewritten.try_recv().is_err(), "must wait for the host's own save");

    tokio::time::advance(Duration::from_millis(2)).await;
    let record = rewritten.recv().await.unwrap();
    assert_eq!(record.player_id, p(4));
    assert_eq!(record.region, r("Overworld"));
    assert_eq!(record.position, Position::new(100.0, 64.0, 200.0));
}

#[tokio::test(start_paused = true)]
async fn test_late_leave_from_previous_region_keeps_player_online() {
    let h = harness();
    let mut events = h.coordinator().subscribe();

    h.coordinator().on_region_enter(p(1), r("A"));
    h.coordinator().on_region_enter(p(1), r("B"));
    h.coordinator().on_region_leave(p(1), r("A"));

    step(2_000).await;
    assert_eq!(h.messenger.count(|n| *n == Notice::Welcome), 1, "actions still run");

    step(35_000).await;
    assert_eq!(h.coordinator().reconcile(), 0);
    assert!(h.coordinator().sessions().is_online(&p(1)));
    assert!(h.directory.departures().is_empty());

    assert_eq!(
        drain(&mut events),
        vec![
            LifecycleEvent::OnlineJoin {
                player_id: p(1),
                is_first_join: true
            },
            LifecycleEvent::RegionChanged {
                player_id: p(1),
                from: r("A"),
                to: r("B")
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_enter_and_disconnect_keep_events_in_order() {
    // Two region contexts report the same player at the same moment: one
    // an arrival, the other a disconnect.
    let h = harness();
    let coordinator = Arc::clone(h.wayfarer.coordinator());
    let mut events = coordinator.subscribe();

    for _ in 0..100 {
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let entering = tokio::task::spawn_blocking({
            let (coordinator, barrier) = (Arc::clone(&coordinator), Arc::clone(&barrier));
            move || {
                barrier.wait();
                coordinator.on_region_enter(p(1), r("A"));
            }
        });
        let leaving = tokio::task::spawn_blocking({
            let (coordinator, barrier) = (Arc::clone(&coordinator), Arc::clone(&barrier));
            move || {
                barrier.wait();
                coordinator.on_disconnect(p(1));
            }
        });
        entering.await.unwrap();
        leaving.await.unwrap();
        coordinator.on_disconnect(p(1));

        assert_eq!(
            coordinator.scheduler().pending(&p(1)),
            0,
            "join actions must not outlive the leave that ended the session"
        );
    }

    let mut online = false;
    let mut joins = 0;
    for event in drain(&mut events) {
        match event {
            LifecycleEvent::OnlineJoin { .. } => {
                assert!(!online, "join while already online");
                online = true;
                joins += 1;
            }
            LifecycleEvent::OfflineLeave { .. } => {
                assert!(online, "leave before its join");
                online = false;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(!online);
    assert!(joins > 0);
    assert_eq!(h.directory.departures().len(), joins);
    assert!(coordinator.sessions().is_empty());
}

// =========================================================================
// Reconciliation through the event feed
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_run_reconciles_leave_without_enter() {
    let h = harness();
    let coordinator = Arc::clone(h.wayfarer.coordinator());
    let mut events = coordinator.subscribe();

    let (tx, rx) = mpsc::channel(16);
    let service = tokio::spawn(h.wayfarer.run(rx));

    tx.send(HostEvent::RegionEnter {
        player_id: p(1),
        region: r("A"),
    })
    .await
    .unwrap();
    tx.send(HostEvent::RegionLeave {
        player_id: p(1),
        region: r("A"),
    })
    .await
    .unwrap();
    settle().await;
    assert!(coordinator.sessions().get(&p(1)).is_some());

    step(29_000).await;
    assert!(coordinator.sessions().get(&p(1)).is_some(), "still inside the leave timeout");

    step(7_000).await;
    assert!(coordinator.sessions().get(&p(1)).is_none());

    drop(tx);
    service.await.unwrap();

    assert_eq!(
        drain(&mut events),
        vec![
            LifecycleEvent::OnlineJoin {
                player_id: p(1),
                is_first_join: true
            },
            LifecycleEvent::OfflineLeave { player_id: p(1) },
        ]
    );
    assert_eq!(h.directory.departures().len(), 1);
}

// =========================================================================
// Teleports
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_death_in_dungeon_routes_to_overworld_spawn() {
    let h = harness();
    h.coordinator().on_region_enter(p(1), r("Dungeon"));

    let decision = h.coordinator().on_death(&DeathEvent {
        player_id: p(1),
        region: r("Dungeon"),
        has_native_respawn: false,
    });
    assert_eq!(
        decision,
        RespawnDecision::CrossRegion {
            target_region: r("Overworld"),
            position: Position::new(100.0, 64.0, 200.0),
            rotation: Rotation::from_yaw(90.0),
        }
    );

    step(600).await;
    assert_eq!(
        h.teleporter.issued(),
        vec![(p(1), Some(r("Overworld")), Position::new(100.0, 64.0, 200.0))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_teleport_and_respawn_do_not_stack() {
    let mut config = base_config();
    config.lifecycle.spawn_on_join = SpawnOnJoin::Always;
    let h = harness_with(config, RecordingDirectory::default());

    h.coordinator().on_region_enter(p(1), r("Dungeon"));
    step(1_000).await;
    assert_eq!(h.teleporter.issued().len(), 1, "join teleport accepted");

    h.coordinator().handle(HostEvent::Death(DeathEvent {
        player_id: p(1),
        region: r("Dungeon"),
        has_native_respawn: false,
    }));
    step(600).await;

    assert_eq!(h.teleporter.issued().len(), 1, "respawn inside the guard window dropped");
}

#[tokio::test(start_paused = true)]
async fn test_first_join_spawn_only_on_first_join() {
    let mut config = base_config();
    config.lifecycle.spawn_on_join = SpawnOnJoin::FirstJoin;
    let h = harness_with(config, RecordingDirectory::default());

    h.coordinator().on_region_enter(p(1), r("Dungeon"));
    step(1_000).await;
    h.coordinator().on_disconnect(p(1));
    h.coordinator().on_region_enter(p(1), r("Dungeon"));
    step(5_000).await;

    assert_eq!(h.teleporter.issued().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_user_teleport_is_immediate_and_blocks_automatic_respawn() {
    let h = harness();
    h.coordinator().on_region_enter(p(1), r("Dungeon"));

    h.coordinator()
        .teleport_user(p(1), Some(&r("Town")), SpawnPoint::new(1.0, 2.0, 3.0, 0.0))
        .unwrap();
    assert_eq!(h.teleporter.issued().len(), 1);

    h.coordinator().on_death(&DeathEvent {
        player_id: p(1),
        region: r("Dungeon"),
        has_native_respawn: false,
    });
    step(600).await;

    assert_eq!(h.teleporter.issued().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_clears_guard_for_next_session() {
    let mut config = base_config();
    config.lifecycle.spawn_on_join = SpawnOnJoin::Always;
    let h = harness_with(config, RecordingDirectory::default());

    h.coordinator().on_region_enter(p(1), r("Dungeon"));
    step(1_000).await;
    h.coordinator().on_disconnect(p(1));
    assert!(h.coordinator().guard().is_empty());

    h.coordinator().on_region_enter(p(1), r("Dungeon"));
    step(1_000).await;
    assert_eq!(h.teleporter.issued().len(), 2);
}

// =========================================================================
// Rewards and admission
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reward_checks_repeat_with_play_time_until_leave() {
    let mut config = base_config();
    config.lifecycle.reward_check_interval_ms = 60_000;
    let h = harness_with(config, RecordingDirectory::default());

    h.coordinator().on_region_enter(p(1), r("A"));
    step(60_000).await;
    step(60_000).await;
    h.coordinator().on_disconnect(p(1));
    step(60_000).await;

    assert_eq!(
        h.directory.rewards(),
        vec![(p(1), Duration::from_secs(60)), (p(1), Duration::from_secs(120))]
    );
}

fn with_admission<A: Admission>(admission: Arc<A>) -> Wayfarer {
    Wayfarer::builder()
        .directory(Arc::new(RecordingDirectory::default()))
        .messenger(Arc::new(RecordingMessenger::default()))
        .admission(admission)
        .spawns(Arc::new(FixedSpawns(HashMap::new())))
        .teleporter(Arc::new(RecordingTeleporter::default()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_connect_start_rejects_denied_player() {
    let wayfarer = with_admission(Arc::new(DenyList("griefer")));
    let c = wayfarer.coordinator();

    let rejection = c.on_connect_start(p(1), "griefer").unwrap_err();
    assert_eq!(rejection.reason, "You are banned from this server.");
    assert!(c.on_connect_start(p(2), "builder").is_ok());
    assert!(c.sessions().is_empty(), "connect-start never opens a session");
}

#[tokio::test]
async fn test_connect_start_admits_when_admission_fails() {
    let wayfarer = with_admission(Arc::new(BrokenAdmission));
    assert!(wayfarer.coordinator().on_connect_start(p(1), "griefer").is_ok());
}

// =========================================================================
// Builder
// =========================================================================

#[test]
fn test_build_without_teleporter_fails() {
    let err = Wayfarer::builder()
        .directory(Arc::new(RecordingDirectory::default()))
        .messenger(Arc::new(RecordingMessenger::default()))
        .admission(Arc::new(OpenAdmission))
        .spawns(Arc::new(FixedSpawns(HashMap::new())))
        .build()
        .unwrap_err();
    assert!(matches!(err, WayfarerError::MissingCollaborator("teleporter")));
}

#[test]
fn test_build_force_spawn_requires_position_records() {
    let mut config = base_config();
    config.lifecycle.force_spawn_on_login = true;
    let err = Wayfarer::builder()
        .config(config)
        .directory(Arc::new(RecordingDirectory::default()))
        .messenger(Arc::new(RecordingMessenger::default()))
        .spawns(Arc::new(FixedSpawns(HashMap::new())))
        .teleporter(Arc::new(RecordingTeleporter::default()))
        .build()
        .unwrap_err();
    assert!(matches!(err, WayfarerError::MissingCollaborator("position records")));
}

#[test]
fn test_build_with_default_config_succeeds() {
    let built = Wayfarer::builder()
        .directory(Arc::new(RecordingDirectory::default()))
        .messenger(Arc::new(RecordingMessenger::default()))
        .spawns(Arc::new(FixedSpawns(HashMap::new())))
        .teleporter(Arc::new(RecordingTeleporter::default()))
        .build();
    assert!(built.is_ok());
}
