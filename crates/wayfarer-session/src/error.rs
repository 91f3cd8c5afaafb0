//! Error types for the session layer.

use wayfarer_protocol::PlayerId;

/// Errors returned when a caller asks for a specific live session.
///
/// Presence notifications themselves never fail: duplicates and
/// out-of-order events are absorbed as no-ops. These errors only surface
/// from lookups that demand "this player, in this session".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No live session exists for the player (never joined, or already
    /// went offline).
    #[error("no live session for player {0}")]
    NotFound(PlayerId),

    /// The player has a session, but not the one the caller captured:
    /// they disconnected and came back since.
    #[error("session epoch for player {player_id} moved from {expected} to {actual}")]
    StaleEpoch {
        player_id: PlayerId,
        expected: u64,
        actual: u64,
    },

    /// The session exists but is mid region change, so it is not
    /// currently Online.
    #[error("player {0} is changing regions")]
    NotOnline(PlayerId),
}
