//! Teleport coordination for Wayfarer.
//!
//! The host's teleport primitive is fire-and-forget and corrupts the
//! client if it is applied twice for the same player in quick
//! succession. Several triggers want to move a player on their own
//! initiative (respawn routing, join-to-spawn), so this crate provides:
//!
//! - [`TeleportGuard`]: one debounce window per player, shared by every
//!   automatic trigger, that user-initiated teleports also close.
//! - [`RespawnRouter`]: decides where a dead player should come back and,
//!   for cross-region respawns, issues the teleport on the death region's
//!   context after a short delay.
//! - [`RegionPattern`]: case-insensitive `*` globs for region exclusions.
//! - [`SpawnStore`] / [`Teleporter`]: the host seams the router calls.

mod error;
mod guard;
mod host;
mod pattern;
mod respawn;

pub use error::TeleportError;
pub use guard::{GuardConfig, TeleportGuard};
pub use host::{SpawnStore, Teleporter};
pub use pattern::RegionPattern;
pub use respawn::{RespawnConfig, RespawnDecision, RespawnRouter, SkipReason};
