//! Game Logic Module
//!
//! The rules of the bidding duel. Synchronous and free of I/O; the hub
//! owns every `MatchState` and drives it.
//!
//! ## Module Structure
//!
//! - `rules`: Contract constants as a `MatchRules` value
//! - `state`: Match state machine, bid validation, termination
//! - `round`: All-pay resolution and win-condition check

pub mod rules;
pub mod round;
pub mod state;

// Re-export key types
pub use rules::MatchRules;
pub use round::{EndReason, RoundRecord, RoundResult};
pub use state::{BidError, BidOutcome, MatchEnd, MatchState, MatchStatus, MatchWinner, RoundReport, Seat, Snapshot};
