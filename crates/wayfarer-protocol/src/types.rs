//! Core data types shared by every Wayfarer layer.
//!
//! Nothing in here has behavior beyond construction, formatting, and
//! (de)serialization. The host bridge builds [`HostEvent`]s, the session
//! layer reads them, and collaborators receive [`LifecycleEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, opaque identifier for a player.
///
/// Newtype wrapper around `u64`: it cannot be confused with any other
/// integer, and it is never reused within a server epoch.
///
/// `#[serde(transparent)]` serializes `PlayerId(42)` as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The name of a region: an independently executing world or level.
///
/// Region names come from the host verbatim. Equality is exact; the
/// respawn exclusion patterns do their own case-insensitive matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionName(String);

impl RegionName {
    /// Wraps a region name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for RegionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for RegionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point in a region's world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Facing direction, in degrees.
///
/// Stored spawns only carry a yaw; `pitch` defaults to level (0.0) when
/// absent from a record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Rotation {
    /// A level rotation facing `yaw`.
    pub fn from_yaw(yaw: f32) -> Self {
        Self { yaw, pitch: 0.0 }
    }
}

/// A stored spawn location: where to put a player, and which way they face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub position: Position,
    pub rotation: Rotation,
}

impl SpawnPoint {
    /// Shorthand for the `{x, y, z, yaw}` tuple spawn stores hand out.
    pub fn new(x: f64, y: f64, z: f64, yaw: f32) -> Self {
        Self {
            position: Position::new(x, y, z),
            rotation: Rotation::from_yaw(yaw),
        }
    }
}

// ---------------------------------------------------------------------------
// Host notifications
// ---------------------------------------------------------------------------

/// A death-recovery notification from the host.
///
/// The host answers "does this player have a native respawn point (bed or
/// equivalent) in the region they died in" up front, so the respawn
/// decision never has to call back into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathEvent {
    pub player_id: PlayerId,
    /// The region the player died in.
    pub region: RegionName,
    /// Whether the player has a host-native respawn point in `region`.
    #[serde(default)]
    pub has_native_respawn: bool,
}

/// A raw lifecycle notification from the host engine.
///
/// Each region delivers these on its own execution context, so the same
/// player's notifications can arrive from several callers at once, out of
/// order with respect to each other, and occasionally duplicated.
/// Connect-Start is not part of this feed: it needs a synchronous answer
/// (admit or reject) and is handled by a direct call instead.
///
/// `#[serde(tag = "type")]` produces `{"type": "RegionEnter", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    /// The player entered (was added to) a region.
    RegionEnter {
        player_id: PlayerId,
        region: RegionName,
    },

    /// The player was removed from a region. On its own this says nothing
    /// about whether they are changing regions or leaving the server.
    RegionLeave {
        player_id: PlayerId,
        region: RegionName,
    },

    /// The player's connection closed. May be delivered more than once.
    Disconnect { player_id: PlayerId },

    /// The player died and is about to respawn.
    Death(DeathEvent),
}

impl HostEvent {
    /// The player this notification is about.
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::RegionEnter { player_id, .. }
            | Self::RegionLeave { player_id, .. }
            | Self::Disconnect { player_id } => *player_id,
            Self::Death(death) => death.player_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle events (exposed to collaborators)
// ---------------------------------------------------------------------------

/// A semantic lifecycle event, derived from the raw host feed.
///
/// For any player, `OnlineJoin` and `OfflineLeave` strictly alternate,
/// starting with `OnlineJoin`. `RegionChanged` only appears between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// The player came online.
    OnlineJoin {
        player_id: PlayerId,
        is_first_join: bool,
    },

    /// The player moved between regions without leaving the server.
    RegionChanged {
        player_id: PlayerId,
        from: RegionName,
        to: RegionName,
    },

    /// The player went offline.
    OfflineLeave { player_id: PlayerId },
}

impl LifecycleEvent {
    /// The player this event is about.
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::OnlineJoin { player_id, .. }
            | Self::RegionChanged { player_id, .. }
            | Self::OfflineLeave { player_id } => *player_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// A player's persisted "last position": where they appear on next login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub player_id: PlayerId,
    pub region: RegionName,
    pub position: Position,
    pub rotation: Rotation,
}

impl PositionRecord {
    /// Builds a record placing `player_id` at `spawn` in `region`.
    pub fn at_spawn(player_id: PlayerId, region: RegionName, spawn: SpawnPoint) -> Self {
        Self {
            player_id,
            region,
            position: spawn.position,
            rotation: spawn.rotation,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_region_name_serializes_as_plain_string() {
        let json = serde_json::to_string(&RegionName::from("Overworld")).unwrap();
        assert_eq!(json, "\"Overworld\"");
    }

    #[test]
    fn test_region_name_equality_is_case_sensitive() {
        assert_ne!(RegionName::from("Hub"), RegionName::from("hub"));
    }

    #[test]
    fn test_spawn_point_new_sets_level_rotation() {
        let spawn = SpawnPoint::new(100.0, 64.0, 200.0, 90.0);
        assert_eq!(spawn.position, Position::new(100.0, 64.0, 200.0));
        assert_eq!(spawn.rotation.yaw, 90.0);
        assert_eq!(spawn.rotation.pitch, 0.0);
    }

    #[test]
    fn test_rotation_pitch_defaults_when_missing() {
        let rot: Rotation = serde_json::from_str(r#"{"yaw": 45.0}"#).unwrap();
        assert_eq!(rot, Rotation::from_yaw(45.0));
    }

    #[test]
    fn test_host_event_json_format() {
        let event = HostEvent::RegionEnter {
            player_id: PlayerId(3),
            region: "Dungeon".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RegionEnter");
        assert_eq!(value["player_id"], 3);
        assert_eq!(value["region"], "Dungeon");
    }

    #[test]
    fn test_host_event_death_defaults_native_respawn() {
        let json = r#"{"type": "Death", "player_id": 9, "region": "Dungeon"}"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();
        match event {
            HostEvent::Death(death) => {
                assert_eq!(death.player_id, PlayerId(9));
                assert!(!death.has_native_respawn);
            }
            other => panic!("expected Death, got {other:?}"),
        }
    }

    #[test]
    fn test_host_event_player_id_covers_every_variant() {
        let events = [
            HostEvent::RegionEnter { player_id: PlayerId(1), region: "A".into() },
            HostEvent::RegionLeave { player_id: PlayerId(1), region: "A".into() },
            HostEvent::Disconnect { player_id: PlayerId(1) },
            HostEvent::Death(DeathEvent {
                player_id: PlayerId(1),
                region: "A".into(),
                has_native_respawn: false,
            }),
        ];
        assert!(events.iter().all(|e| e.player_id() == PlayerId(1)));
    }

    #[test]
    fn test_lifecycle_event_json_format() {
        let event = LifecycleEvent::RegionChanged {
            player_id: PlayerId(5),
            from: "A".into(),
            to: "B".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "RegionChanged");
        assert_eq!(value["from"], "A");
        assert_eq!(value["to"], "B");
        assert_eq!(event.player_id(), PlayerId(5));
    }

    #[test]
    fn test_position_record_at_spawn_copies_coordinates() {
        let spawn = SpawnPoint::new(1.0, 2.0, 3.0, 180.0);
        let record = PositionRecord::at_spawn(PlayerId(4), "Overworld".into(), spawn);
        assert_eq!(record.position, spawn.position);
        assert_eq!(record.rotation, spawn.rotation);
        assert_eq!(record.region.as_str(), "Overworld");
    }
}
