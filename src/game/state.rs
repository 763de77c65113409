//! Match State
//!
//! A single duel between two seated players. Owns positions, balances,
//! pending bids, the round counter and the append-only round history.
//! Seating is fixed at creation: seat one is the challenger.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::ids::{MatchId, UserId};
use crate::game::round::{apply_round, check_win_condition, EndReason, RoundRecord};
use crate::game::rules::MatchRules;

// =============================================================================
// SEATS & OUTCOMES
// =============================================================================

/// Which side of the match a player sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Seat {
    /// Player one (the challenger).
    One,
    /// Player two (the challenged user).
    Two,
}

impl Seat {
    /// Array index of this seat.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Seat::One => 0,
            Seat::Two => 1,
        }
    }

    /// Wire number (`1` or `2`).
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }

    /// The opposite seat.
    #[inline]
    pub fn other(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }
}

/// Lifecycle of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Waiting for one or both bids of the current round.
    AwaitingBids,
    /// Both bids are in and the round is being resolved.
    Resolving,
    /// Terminal.
    Finished,
}

/// Winner of a finished match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchWinner {
    /// Player one won.
    PlayerOne,
    /// Player two won.
    PlayerTwo,
    /// Nobody won.
    Draw,
}

impl MatchWinner {
    /// The winner sitting in `seat`.
    pub fn from_seat(seat: Seat) -> Self {
        match seat {
            Seat::One => MatchWinner::PlayerOne,
            Seat::Two => MatchWinner::PlayerTwo,
        }
    }

    /// Wire code: 1 = player one, 2 = player two, 3 = draw.
    pub fn code(self) -> u8 {
        match self {
            MatchWinner::PlayerOne => 1,
            MatchWinner::PlayerTwo => 2,
            MatchWinner::Draw => 3,
        }
    }
}

/// How a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchEnd {
    /// Winner, `None` when the match was abandoned.
    pub winner: Option<MatchWinner>,
    /// Reason.
    pub reason: EndReason,
}

// =============================================================================
// BIDS
// =============================================================================

/// Bid rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BidError {
    /// Bid below zero.
    #[error("Bid must be non-negative")]
    Negative,

    /// Bid larger than the bidder's balance.
    #[error("Bid exceeds your balance")]
    ExceedsBalance {
        /// Submitted bid.
        bid: i64,
        /// Balance at submission.
        balance: u32,
    },

    /// The match is already over.
    #[error("Game is already over")]
    MatchFinished,
}

/// Result of a bid submission that was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidOutcome {
    /// Stored; the other side has not bid yet.
    Waiting,
    /// Both bids were present and the round was resolved.
    Resolved(RoundReport),
}

/// Everything a resolved round produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    /// The history entry.
    pub record: RoundRecord,
    /// Balances after deduction.
    pub balances: [u32; 2],
    /// Set when this round ended the match.
    pub end: Option<MatchEnd>,
}

/// Per-round view pushed at the start of every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current round number.
    pub round: u32,
    /// Balances of player one and two.
    pub balances: [u32; 2],
    /// Positions of player one and two.
    pub positions: [u32; 2],
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// A two-player all-pay duel.
#[derive(Debug, Clone)]
pub struct MatchState {
    /// Match identifier.
    pub id: MatchId,
    /// Rules this match runs under.
    pub rules: MatchRules,
    players: [UserId; 2],
    positions: [u32; 2],
    balances: [u32; 2],
    pending_bids: [Option<u32>; 2],
    round: u32,
    status: MatchStatus,
    history: Vec<RoundRecord>,
    winner: Option<MatchWinner>,
    end_reason: Option<EndReason>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    rematch_requested_by: Option<Seat>,
}

impl MatchState {
    /// Seat `player_one` and `player_two` in a fresh match at round 1.
    pub fn new(
        id: MatchId,
        player_one: UserId,
        player_two: UserId,
        rules: MatchRules,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            rules,
            players: [player_one, player_two],
            positions: [0, 0],
            balances: [rules.initial_budget; 2],
            pending_bids: [None, None],
            round: 1,
            status: MatchStatus::AwaitingBids,
            history: Vec::new(),
            winner: None,
            end_reason: None,
            started_at: now,
            ended_at: None,
            rematch_requested_by: None,
        }
    }

    /// Player in `seat`.
    pub fn player(&self, seat: Seat) -> UserId {
        self.players[seat.index()]
    }

    /// Both players, seat one first.
    pub fn players(&self) -> [UserId; 2] {
        self.players
    }

    /// Seat of `user`, if they play in this match.
    pub fn seat_of(&self, user: &UserId) -> Option<Seat> {
        if self.players[0] == *user {
            Some(Seat::One)
        } else if self.players[1] == *user {
            Some(Seat::Two)
        } else {
            None
        }
    }

    /// Current status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Whether the match is over.
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    /// Current round number.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Position of `seat`.
    pub fn position(&self, seat: Seat) -> u32 {
        self.positions[seat.index()]
    }

    /// Balance of `seat`.
    pub fn balance(&self, seat: Seat) -> u32 {
        self.balances[seat.index()]
    }

    /// Pending bid of `seat` in the current round.
    pub fn pending_bid(&self, seat: Seat) -> Option<u32> {
        self.pending_bids[seat.index()]
    }

    /// Resolved rounds, oldest first.
    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// Winner once finished.
    pub fn winner(&self) -> Option<MatchWinner> {
        self.winner
    }

    /// End reason once finished.
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Creation time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Finish time.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Round-start view of the match.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            round: self.round,
            balances: self.balances,
            positions: self.positions,
        }
    }

    /// Submit (or overwrite) the bid of `seat` for the current round.
    ///
    /// Resolves the round as soon as both bids are present.
    pub fn submit_bid(
        &mut self,
        seat: Seat,
        bid: i64,
        now: DateTime<Utc>,
    ) -> Result<BidOutcome, BidError> {
        if self.status != MatchStatus::AwaitingBids {
            return Err(BidError::MatchFinished);
        }

        let balance = self.balances[seat.index()];
        if bid < 0 {
            return Err(BidError::Negative);
        }
        if bid > i64::from(balance) {
            return Err(BidError::ExceedsBalance { bid, balance });
        }

        // bid is within [0, balance] so it fits in u32
        self.pending_bids[seat.index()] = Some(bid as u32);

        match self.pending_bids {
            [Some(p1), Some(p2)] => Ok(BidOutcome::Resolved(self.resolve_round([p1, p2], now))),
            _ => Ok(BidOutcome::Waiting),
        }
    }

    fn resolve_round(&mut self, bids: [u32; 2], now: DateTime<Utc>) -> RoundReport {
        self.status = MatchStatus::Resolving;

        let result = apply_round(&mut self.balances, &mut self.positions, bids, &self.rules);
        let record = RoundRecord {
            round: self.round,
            bids,
            positions: self.positions,
            result,
        };
        self.history.push(record);

        let end = check_win_condition(self.positions, self.balances, &self.rules)
            .map(|(winner, reason)| self.finish(Some(winner), reason, now));

        if end.is_none() {
            self.round += 1;
            self.pending_bids = [None, None];
            self.status = MatchStatus::AwaitingBids;
        }

        RoundReport {
            record,
            balances: self.balances,
            end,
        }
    }

    /// `seat` gives up; the other seat wins. `None` if already finished.
    pub fn resign(&mut self, seat: Seat, now: DateTime<Utc>) -> Option<MatchEnd> {
        if self.is_finished() {
            return None;
        }
        let winner = MatchWinner::from_seat(seat.other());
        Some(self.finish(Some(winner), EndReason::OpponentResigned, now))
    }

    /// Terminate without a winner because a player left.
    ///
    /// Returns `true` if the match was still live.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_finished() {
            return false;
        }
        self.finish(None, EndReason::OpponentDisconnected, now);
        true
    }

    fn finish(&mut self, winner: Option<MatchWinner>, reason: EndReason, now: DateTime<Utc>) -> MatchEnd {
        self.status = MatchStatus::Finished;
        self.winner = winner;
        self.end_reason = Some(reason);
        self.ended_at = Some(now);
        self.pending_bids = [None, None];
        MatchEnd { winner, reason }
    }

    /// Record that `seat` wants a rematch.
    pub fn request_rematch(&mut self, seat: Seat) {
        self.rematch_requested_by = Some(seat);
    }

    /// Seat that asked for a rematch, if any.
    pub fn rematch_requested_by(&self) -> Option<Seat> {
        self.rematch_requested_by
    }

    /// Forget a rematch request once it has been answered.
    pub fn clear_rematch_request(&mut self) -> Option<Seat> {
        self.rematch_requested_by.take()
    }
}
