//! Shared vocabulary for Wayfarer.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here:
//!
//! - **Identity** ([`PlayerId`], [`RegionName`]): who and where.
//! - **Geometry** ([`Position`], [`Rotation`], [`SpawnPoint`]): the
//!   coordinates a teleport targets.
//! - **Host notifications** ([`HostEvent`], [`DeathEvent`]): the raw,
//!   possibly duplicated or reordered feed coming from the game engine.
//! - **Lifecycle events** ([`LifecycleEvent`]): the cleaned-up semantic
//!   events Wayfarer exposes to collaborators.
//! - **Records** ([`PositionRecord`], [`Codec`], [`JsonCodec`]): the
//!   persisted "last position" a player logs back in at.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (wayfarer)         ← consumes HostEvent, emits LifecycleEvent
//!     ↕
//! Teleport / Scheduler / Session ← share PlayerId, RegionName, SpawnPoint
//!     ↕
//! Protocol (this crate)          ← plain data, no runtime
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{CollaboratorError, ProtocolError};
pub use types::{
    DeathEvent, HostEvent, LifecycleEvent, PlayerId, Position, PositionRecord,
    RegionName, Rotation, SpawnPoint,
};
