//! Region manager: starts, tracks, and stops region executors.

use dashmap::DashMap;
use wayfarer_protocol::RegionName;

use crate::executor::spawn_region;
use crate::{Job, RegionError, RegionHandle};

/// Registry of running region executors, keyed by region name.
///
/// Shared by every layer that needs to run something "on the player's
/// region": the scheduler looks the region up at execution time, not at
/// scheduling time, because the player may have moved in between.
///
/// Backed by a `DashMap`, so lookups for one region never wait on a
/// region being started or stopped elsewhere.
#[derive(Default)]
pub struct RegionManager {
    regions: DashMap<RegionName, RegionHandle>,
}

impl RegionManager {
    /// Creates an empty manager. Must be used inside a Tokio runtime
    /// because executors are spawned as tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the executor for `region`, starting one if none is running.
    ///
    /// An executor that stopped on its own is replaced.
    pub fn ensure(&self, region: &RegionName) -> RegionHandle {
        if let Some(handle) = self.regions.get(region) {
            if handle.is_running() {
                return handle.value().clone();
            }
        }

        let mut entry = self
            .regions
            .entry(region.clone())
            .or_insert_with(|| spawn_region(region.clone()));
        if !entry.is_running() {
            *entry = spawn_region(region.clone());
        }
        entry.value().clone()
    }

    /// Returns the executor for `region`, if one is running.
    pub fn get(&self, region: &RegionName) -> Option<RegionHandle> {
        self.regions
            .get(region)
            .filter(|handle| handle.is_running())
            .map(|handle| handle.value().clone())
    }

    /// Queues a job on `region`'s executor.
    ///
    /// # Errors
    /// - [`RegionError::NotFound`] if no executor is running for `region`
    /// - [`RegionError::Unavailable`] if it stopped while we submitted
    pub fn execute(&self, region: &RegionName, job: Job) -> Result<(), RegionError> {
        let handle = self
            .get(region)
            .ok_or_else(|| RegionError::NotFound(region.clone()))?;
        handle.execute(job)
    }

    /// Stops `region`'s executor after its queue drains and forgets it.
    pub fn close(&self, region: &RegionName) -> Result<(), RegionError> {
        let (_, handle) = self
            .regions
            .remove(region)
            .ok_or_else(|| RegionError::NotFound(region.clone()))?;
        let _ = handle.shutdown();
        tracing::info!(%region, "region closed");
        Ok(())
    }

    /// Number of registered executors.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns `true` if no executors are registered.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Names of all registered regions.
    pub fn names(&self) -> Vec<RegionName> {
        self.regions.iter().map(|entry| entry.key().clone()).collect()
    }
}
