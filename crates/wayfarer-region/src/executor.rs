//! Region executor: an isolated Tokio task that owns a region's work queue.
//!
//! Each region runs in its own task, communicating with the outside world
//! through an mpsc channel. Jobs run one at a time in submission order,
//! which is exactly the guarantee the host gives its own region threads.

use std::panic::{self, AssertUnwindSafe};

use tokio::sync::{mpsc, oneshot};
use wayfarer_protocol::RegionName;

use crate::RegionError;

/// A unit of work executed on a region's context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Commands sent to a region executor through its channel.
pub(crate) enum RegionCommand {
    /// Run a job on the region's context.
    Execute(Job),

    /// Report the executor's counters.
    Info { reply: oneshot::Sender<RegionInfo> },

    /// Stop after draining everything queued before this command.
    Shutdown,
}

/// A snapshot of executor counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    /// The region this executor serves.
    pub region: RegionName,
    /// Jobs that ran to completion.
    pub executed: u64,
    /// Jobs that panicked.
    pub failed: u64,
}

/// Handle to a running region executor.
///
/// Cheap to clone; it's an `mpsc::UnboundedSender` wrapper. Submitting a
/// job never blocks the caller, so it is safe to do from inside another
/// region's job.
#[derive(Debug, Clone)]
pub struct RegionHandle {
    region: RegionName,
    sender: mpsc::UnboundedSender<RegionCommand>,
}

impl RegionHandle {
    /// The region this handle targets.
    pub fn region(&self) -> &RegionName {
        &self.region
    }

    /// Queues a job on the region's context.
    ///
    /// # Errors
    /// [`RegionError::Unavailable`] if the executor has stopped.
    pub fn execute(&self, job: Job) -> Result<(), RegionError> {
        self.sender
            .send(RegionCommand::Execute(job))
            .map_err(|_| RegionError::Unavailable(self.region.clone()))
    }

    /// Requests the executor's counters. Answered after every job queued
    /// before this call has run.
    pub async fn info(&self) -> Result<RegionInfo, RegionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RegionCommand::Info { reply: reply_tx })
            .map_err(|_| RegionError::Unavailable(self.region.clone()))?;
        reply_rx
            .await
            .map_err(|_| RegionError::Unavailable(self.region.clone()))
    }

    /// Tells the executor to stop once its queue drains.
    pub fn shutdown(&self) -> Result<(), RegionError> {
        self.sender
            .send(RegionCommand::Shutdown)
            .map_err(|_| RegionError::Unavailable(self.region.clone()))
    }

    /// Whether the executor task is still accepting work.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// The internal executor state. Runs inside a Tokio task.
struct RegionExecutor {
    region: RegionName,
    executed: u64,
    failed: u64,
    receiver: mpsc::UnboundedReceiver<RegionCommand>,
}

impl RegionExecutor {
    async fn run(mut self) {
        tracing::info!(region = %self.region, "region executor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RegionCommand::Execute(job) => self.run_job(job),
                RegionCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                RegionCommand::Shutdown => {
                    tracing::info!(region = %self.region, "region executor shutting down");
                    break;
                }
            }
        }

        tracing::info!(
            region = %self.region,
            executed = self.executed,
            failed = self.failed,
            "region executor stopped"
        );
    }

    /// A panicking job must not take the region down with it.
    fn run_job(&mut self, job: Job) {
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => self.executed += 1,
            Err(payload) => {
                self.failed += 1;
                tracing::error!(
                    region = %self.region,
                    panic = %panic_message(payload.as_ref()),
                    "region job panicked"
                );
            }
        }
    }

    fn info(&self) -> RegionInfo {
        RegionInfo {
            region: self.region.clone(),
            executed: self.executed,
            failed: self.failed,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Spawns a new region executor task and returns a handle to it.
pub(crate) fn spawn_region(region: RegionName) -> RegionHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let executor = RegionExecutor {
        region: region.clone(),
        executed: 0,
        failed: 0,
        receiver: rx,
    };

    tokio::spawn(executor.run());

    RegionHandle { region, sender: tx }
}
