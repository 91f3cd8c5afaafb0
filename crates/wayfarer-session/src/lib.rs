//! Player presence tracking for Wayfarer.
//!
//! The host tells us four things about a player, from whichever region
//! happens to be handling them: they entered a region, they left a region,
//! they disconnected, or (through the admission layer) they are trying to
//! connect. This crate turns that noisy stream into exactly one of three
//! semantic transitions per observation:
//!
//! 1. **OnlineJoin**: an offline player showed up somewhere
//! 2. **RegionChanged**: an online player moved between regions
//! 3. **OfflineLeave**: an online player is gone
//!
//! The decision itself is a pure function ([`transition`]) over
//! `(state, event)`. [`SessionTracker`] applies it per player under that
//! player's map entry, so two regions reporting on the same player never
//! interleave, while unrelated players never wait on each other.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)   ← reacts to transitions with side effects
//!     ↕
//! Session (this crate)  ← authoritative online / region-changing state
//!     ↕
//! Protocol (below)      ← PlayerId, RegionName
//! ```

mod error;
mod machine;
mod session;
mod tracker;

pub use error::SessionError;
pub use machine::{PresenceEvent, TransitionKind, transition};
pub use session::{PlayerSession, SessionConfig, SessionState};
pub use tracker::{SessionTracker, Transition};
