//! # Wayfarer
//!
//! Session and teleport coordination for multi-region game servers.
//!
//! The host engine reports what happens to players from whichever region
//! is handling them: entered a region, left a region, disconnected, died.
//! Those reports arrive concurrently, out of order, and sometimes twice.
//! Wayfarer turns them into a consistent view of who is online, fires
//! join / region-change / leave side effects at the right time, and keeps
//! automatic teleports from landing on top of each other.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wayfarer::prelude::*;
//!
//! wayfarer::telemetry::init_logging()?;
//! let wayfarer = Wayfarer::builder()
//!     .config(WayfarerConfig::from_json_file("wayfarer.json")?)
//!     .directory(directory)
//!     .messenger(messenger)
//!     .spawns(spawns)
//!     .teleporter(teleporter)
//!     .build()?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(1024);
//! tokio::spawn(wayfarer.run(rx));
//! tx.send(HostEvent::RegionEnter { player_id: PlayerId(1), region: "Overworld".into() }).await?;
//! ```

mod collab;
mod config;
mod coordinator;
mod error;
mod records;
mod service;
pub mod telemetry;

pub use collab::{
    Admission, Departure, Messenger, Notice, OpenAdmission, PlayerDirectory, PositionRecords,
    Rejection,
};
pub use config::{LifecycleConfig, SpawnOnJoin, WayfarerConfig};
pub use coordinator::{Collaborators, LifecycleCoordinator};
pub use error::WayfarerError;
pub use records::JsonPositionRecords;
pub use service::{Wayfarer, WayfarerBuilder};

/// Re-exports of the layer crates, for callers who need more than the
/// prelude.
pub use wayfarer_protocol as protocol;
pub use wayfarer_region as region;
pub use wayfarer_scheduler as scheduler;
pub use wayfarer_session as session;
pub use wayfarer_teleport as teleport;

/// Everything an embedding server usually needs.
pub mod prelude {
    pub use crate::{
        Admission, Departure, LifecycleCoordinator, Messenger, Notice, PlayerDirectory,
        PositionRecords, Rejection, Wayfarer, WayfarerConfig, WayfarerError,
    };
    pub use wayfarer_protocol::{
        CollaboratorError, DeathEvent, HostEvent, LifecycleEvent, PlayerId, Position,
        PositionRecord, RegionName, Rotation, SpawnPoint,
    };
    pub use wayfarer_scheduler::{ActionResult, DelayedActionScheduler, ExecutionTarget};
    pub use wayfarer_teleport::{RespawnDecision, SpawnStore, Teleporter};
}
