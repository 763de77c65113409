//! Match Rules
//!
//! The numeric parameters of a duel. Production matches always use
//! [`MatchRules::default`], which carries the contract constants.

use serde::{Serialize, Deserialize};
use crate::{INITIAL_BUDGET, MAX_STEPS};

/// Parameters of a single match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRules {
    /// Position that wins the match.
    pub max_steps: u32,
    /// Starting balance of each player.
    pub initial_budget: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            max_steps: MAX_STEPS,
            initial_budget: INITIAL_BUDGET,
        }
    }
}
