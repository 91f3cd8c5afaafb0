//! Region execution contexts for Wayfarer.
//!
//! The host runs every region on its own single-threaded context. Wayfarer
//! mirrors that with one Tokio task per region (actor model): work aimed
//! at a region is queued on its channel and executed strictly in order,
//! never concurrently with other work for the same region.
//!
//! # Key types
//!
//! - [`RegionManager`]: starts, finds, and stops region executors
//! - [`RegionHandle`]: queue jobs on a running executor
//! - [`RegionInfo`]: counters reported by an executor

mod error;
mod executor;
mod manager;

pub use error::RegionError;
pub use executor::{Job, RegionHandle, RegionInfo};
pub use manager::RegionManager;
