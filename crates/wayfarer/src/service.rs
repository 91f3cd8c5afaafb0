//! `Wayfarer` builder and event-feed loop.
//!
//! This is the entry point for embedding Wayfarer in a game server. It
//! ties the layers together: host feed → session → coordinator →
//! scheduler → region executors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use wayfarer_protocol::HostEvent;
use wayfarer_teleport::{SpawnStore, Teleporter};

use crate::{
    Admission, Collaborators, LifecycleCoordinator, Messenger, OpenAdmission, PlayerDirectory,
    PositionRecords, WayfarerConfig, WayfarerError,
};

/// Builder for a [`Wayfarer`] instance.
///
/// # Example
///
/// ```rust,ignore
/// let wayfarer = Wayfarer::builder()
///     .config(WayfarerConfig::from_json_file("wayfarer.json")?)
///     .directory(Arc::new(my_directory))
///     .messenger(Arc::new(my_chat))
///     .spawns(Arc::new(my_spawns))
///     .teleporter(Arc::new(my_engine))
///     .build()?;
///
/// let (tx, rx) = tokio::sync::mpsc::channel(1024);
/// // host callbacks push HostEvents into `tx`
/// wayfarer.run(rx).await;
/// ```
pub struct WayfarerBuilder {
    config: WayfarerConfig,
    directory: Option<Arc<dyn PlayerDirectory>>,
    messenger: Option<Arc<dyn Messenger>>,
    admission: Arc<dyn Admission>,
    spawns: Option<Arc<dyn SpawnStore>>,
    teleporter: Option<Arc<dyn Teleporter>>,
    records: Option<Arc<dyn PositionRecords>>,
}

impl WayfarerBuilder {
    /// Creates a builder with default configuration and open admission.
    pub fn new() -> Self {
        Self {
            config: WayfarerConfig::default(),
            directory: None,
            messenger: None,
            admission: Arc::new(OpenAdmission),
            spawns: None,
            teleporter: None,
            records: None,
        }
    }

    pub fn config(mut self, config: WayfarerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directory<D: PlayerDirectory>(mut self, directory: Arc<D>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn messenger<M: Messenger>(mut self, messenger: Arc<M>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn admission<A: Admission>(mut self, admission: Arc<A>) -> Self {
        self.admission = admission;
        self
    }

    pub fn spawns<S: SpawnStore>(mut self, spawns: Arc<S>) -> Self {
        self.spawns = Some(spawns);
        self
    }

    pub fn teleporter<T: Teleporter>(mut self, teleporter: Arc<T>) -> Self {
        self.teleporter = Some(teleporter);
        self
    }

    /// Required when `lifecycle.force_spawn_on_login` is set.
    pub fn position_records<R: PositionRecords>(mut self, records: Arc<R>) -> Self {
        self.records = Some(records);
        self
    }

    /// Validates the configuration and wires everything up.
    ///
    /// # Errors
    /// - [`WayfarerError::MissingCollaborator`] if a required collaborator
    ///   was not set
    /// - [`WayfarerError::Teleport`] if an exclusion pattern is invalid
    pub fn build(self) -> Result<Wayfarer, WayfarerError> {
        let config = self.config.validated();
        let collab = Collaborators {
            directory: self
                .directory
                .ok_or(WayfarerError::MissingCollaborator("player directory"))?,
            messenger: self
                .messenger
                .ok_or(WayfarerError::MissingCollaborator("messenger"))?,
            admission: self.admission,
            spawns: self
                .spawns
                .ok_or(WayfarerError::MissingCollaborator("spawn store"))?,
            teleporter: self
                .teleporter
                .ok_or(WayfarerError::MissingCollaborator("teleporter"))?,
            records: self.records,
        };

        let coordinator = Arc::new(LifecycleCoordinator::new(&config, collab)?);
        Ok(Wayfarer {
            coordinator,
            sweep_interval: config.lifecycle.sweep_interval(),
        })
    }
}

impl Default for WayfarerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured Wayfarer instance.
///
/// Host callbacks can either call the [`coordinator`](Self::coordinator)
/// directly or push [`HostEvent`]s into the channel given to
/// [`run`](Self::run).
#[derive(Debug)]
pub struct Wayfarer {
    coordinator: Arc<LifecycleCoordinator>,
    sweep_interval: Duration,
}

impl Wayfarer {
    pub fn builder() -> WayfarerBuilder {
        WayfarerBuilder::new()
    }

    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    /// Drains host notifications in delivery order and runs the
    /// reconciliation sweep every `sweep_interval_ms`.
    ///
    /// Returns once the feed is closed and every sender dropped, after
    /// shutting down the region executors.
    pub async fn run(self, mut feed: mpsc::Receiver<HostEvent>) {
        tracing::info!(sweep_ms = self.sweep_interval.as_millis() as u64, "wayfarer running");

        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        sweep.tick().await;

        loop {
            tokio::select! {
                event = feed.recv() => match event {
                    Some(event) => self.coordinator.handle(event),
                    None => break,
                },
                _ = sweep.tick() => {
                    let reconciled = self.coordinator.reconcile();
                    if reconciled > 0 {
                        tracing::debug!(reconciled, "sweep reconciled stuck region changes");
                    }
                }
            }
        }

        tracing::info!("host feed closed, shutting down");
        self.coordinator.shutdown();
    }
}
