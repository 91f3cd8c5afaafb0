//! Host-side seams the teleport layer calls into.
//!
//! Both are implemented by the embedding server. They are called from
//! region contexts and must not block for long.

use wayfarer_protocol::{
    CollaboratorError, PlayerId, Position, RegionName, Rotation, SpawnPoint,
};

/// Stored spawn positions, one per region.
pub trait SpawnStore: Send + Sync + 'static {
    /// The stored spawn for `region`, or `None` if none was ever set.
    fn spawn(&self, region: &RegionName) -> Result<Option<SpawnPoint>, CollaboratorError>;
}

/// The host's teleport primitive.
///
/// Fire-and-forget, and unsafe to call twice for the same player in a
/// short interval. Callers go through a
/// [`TeleportGuard`](crate::TeleportGuard) first.
pub trait Teleporter: Send + Sync + 'static {
    /// Moves `player_id` to `position` facing `rotation`. A `None` region
    /// keeps the player in the region they are in.
    fn issue_teleport(
        &self,
        player_id: PlayerId,
        target_region: Option<&RegionName>,
        position: Position,
        rotation: Rotation,
    ) -> Result<(), CollaboratorError>;
}
