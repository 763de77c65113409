//! Round Resolution
//!
//! The all-pay auction step and the win-condition check. Both are pure
//! functions over plain numbers so the rules can be tested in isolation.

use serde::{Serialize, Deserialize};

use crate::game::rules::MatchRules;
use crate::game::state::MatchWinner;

// =============================================================================
// ROUND OUTCOME
// =============================================================================

/// Textual outcome tag of one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundResult {
    /// Player one bid strictly more and advanced.
    #[serde(rename = "P1_WINS_ROUND")]
    PlayerOneWins,
    /// Player two bid strictly more and advanced.
    #[serde(rename = "P2_WINS_ROUND")]
    PlayerTwoWins,
    /// Equal bids, nobody moved.
    #[serde(rename = "DRAW")]
    Draw,
}

impl RoundResult {
    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            RoundResult::PlayerOneWins => "P1_WINS_ROUND",
            RoundResult::PlayerTwoWins => "P2_WINS_ROUND",
            RoundResult::Draw => "DRAW",
        }
    }
}

/// One resolved round. Written once into the match history, never edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round number (1-based).
    pub round: u32,
    /// Bids of player one and player two.
    pub bids: [u32; 2],
    /// Positions after movement.
    pub positions: [u32; 2],
    /// Outcome tag.
    pub result: RoundResult,
}

/// Compare two bids. Strictly higher wins, equal is a draw.
pub fn compare_bids(p1_bid: u32, p2_bid: u32) -> RoundResult {
    use std::cmp::Ordering;

    match p1_bid.cmp(&p2_bid) {
        Ordering::Greater => RoundResult::PlayerOneWins,
        Ordering::Less => RoundResult::PlayerTwoWins,
        Ordering::Equal => RoundResult::Draw,
    }
}

/// Apply one all-pay round to balances and positions.
///
/// Both players pay their own bid whatever the outcome. The higher bidder
/// advances one step, capped at `rules.max_steps`. Bids must already be
/// validated against the balances.
pub fn apply_round(
    balances: &mut [u32; 2],
    positions: &mut [u32; 2],
    bids: [u32; 2],
    rules: &MatchRules,
) -> RoundResult {
    debug_assert!(bids[0] <= balances[0] && bids[1] <= balances[1]);

    // Deduction
    balances[0] = balances[0].saturating_sub(bids[0]);
    balances[1] = balances[1].saturating_sub(bids[1]);

    // Movement
    let result = compare_bids(bids[0], bids[1]);
    match result {
        RoundResult::PlayerOneWins => positions[0] = (positions[0] + 1).min(rules.max_steps),
        RoundResult::PlayerTwoWins => positions[1] = (positions[1] + 1).min(rules.max_steps),
        RoundResult::Draw => {}
    }

    result
}

// =============================================================================
// WIN CONDITION
// =============================================================================

/// Why a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// A player reached the final step.
    ReachedFinalStep,
    /// Both balances hit zero and one player stood higher.
    BankruptcyHigherPosition,
    /// Both balances hit zero on equal positions.
    BankruptcyDraw,
    /// The loser resigned.
    OpponentResigned,
    /// A player's connection went away mid-match.
    OpponentDisconnected,
}

impl EndReason {
    /// Human-readable reason sent in `game_end`.
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::ReachedFinalStep => "reached final step",
            EndReason::BankruptcyHigherPosition => "bankruptcy stalemate — higher position wins",
            EndReason::BankruptcyDraw => "bankruptcy stalemate — draw",
            EndReason::OpponentResigned => "opponent resigned",
            EndReason::OpponentDisconnected => "opponent disconnected",
        }
    }
}

/// Evaluate the win condition after a round.
///
/// Priority: player one at the goal, then player two at the goal, then the
/// bankruptcy stalemate (both balances exactly zero). `None` means the match
/// continues.
pub fn check_win_condition(
    positions: [u32; 2],
    balances: [u32; 2],
    rules: &MatchRules,
) -> Option<(MatchWinner, EndReason)> {
    if positions[0] >= rules.max_steps {
        return Some((MatchWinner::PlayerOne, EndReason::ReachedFinalStep));
    }
    if positions[1] >= rules.max_steps {
        return Some((MatchWinner::PlayerTwo, EndReason::ReachedFinalStep));
    }

    if balances == [0, 0] {
        return Some(match positions[0].cmp(&positions[1]) {
            std::cmp::Ordering::Greater => (MatchWinner::PlayerOne, EndReason::BankruptcyHigherPosition),
            std::cmp::Ordering::Less => (MatchWinner::PlayerTwo, EndReason::BankruptcyHigherPosition),
            std::cmp::Ordering::Equal => (MatchWinner::Draw, EndReason::BankruptcyDraw),
        });
    }

    None
}
