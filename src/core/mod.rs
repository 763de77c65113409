//! Core primitives.
//!
//! Identifier types shared by the game rules, the hub and the wire protocol.

pub mod ids;

// Re-export core types
pub use ids::{ChallengeId, ConnectionId, MatchId, UserId};
