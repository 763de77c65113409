//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON object with a `type` discriminator; field names are
//! camelCase.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::core::ids::{ChallengeId, MatchId, UserId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Invite another user to a match.
    #[serde(rename_all = "camelCase")]
    Challenge {
        /// User being challenged.
        target_user_id: UserId,
    },

    /// Accept a challenge addressed to us.
    #[serde(rename_all = "camelCase")]
    AcceptChallenge {
        /// Challenge being accepted.
        challenge_id: ChallengeId,
    },

    /// Decline a challenge addressed to us.
    #[serde(rename_all = "camelCase")]
    DeclineChallenge {
        /// Challenge being declined.
        challenge_id: ChallengeId,
    },

    /// Bid for the current round.
    #[serde(rename_all = "camelCase")]
    SubmitBid {
        /// Match the bid belongs to.
        game_id: MatchId,
        /// Amount; validated against the bidder's balance.
        bid: i64,
    },

    /// Give up the match.
    #[serde(rename_all = "camelCase")]
    Resign {
        /// Match to resign.
        game_id: MatchId,
    },

    /// Ask the opponent for another match.
    #[serde(rename_all = "camelCase")]
    Rematch {
        /// Finished match.
        game_id: MatchId,
    },

    /// Accept the opponent's rematch request.
    #[serde(rename_all = "camelCase")]
    AcceptRematch {
        /// Finished match the request was made on.
        game_id: MatchId,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

impl ClientMessage {
    /// Every `type` tag the server understands.
    pub const TYPES: &'static [&'static str] = &[
        "challenge",
        "accept_challenge",
        "decline_challenge",
        "submit_bid",
        "resign",
        "rematch",
        "accept_rematch",
        "ping",
    ];
}

/// Inbound frame rejection.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON, no `type`, or bad fields for a known type.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Well-formed envelope with a `type` we do not handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Identity confirmation, first message on every connection.
    Welcome(Welcome),

    /// Refreshed online-user list.
    UsersUpdate(UsersUpdate),

    /// Someone challenged us.
    ChallengeReceived(ChallengeReceived),

    /// Our challenge was declined.
    #[serde(rename_all = "camelCase")]
    ChallengeDeclined {
        /// Declined challenge.
        challenge_id: ChallengeId,
    },

    /// A challenge expired or its counterpart left.
    ChallengeExpired(ChallengeExpired),

    /// A match started.
    GameStart(GameStart),

    /// Round-start snapshot.
    WaitingForBids(WaitingForBids),

    /// Outcome of a resolved round.
    RoundResult(RoundResultInfo),

    /// Match over.
    GameEnd(GameEnd),

    /// The opponent's connection went away.
    #[serde(rename_all = "camelCase")]
    OpponentDisconnected {
        /// Abandoned match.
        game_id: MatchId,
    },

    /// Opponent asks for a rematch.
    RematchReceived(RematchReceived),

    /// Pong response.
    #[serde(rename_all = "camelCase")]
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server wall clock (ms since epoch).
        server_time: u64,
    },

    /// Error message.
    Error {
        /// Human-readable message.
        message: String,
    },

    /// Server is shutting down.
    Shutdown {
        /// Reason.
        reason: String,
    },
}

/// Identity confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    /// Assigned identity.
    pub user_id: UserId,
    /// Generated display name.
    pub username: String,
}

/// Online-user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersUpdate {
    /// Every live user.
    pub users: Vec<UserSummary>,
}

/// One entry of the online-user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Identity.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Currently playing.
    pub in_game: bool,
}

/// Incoming challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeReceived {
    /// Challenge identifier.
    pub challenge_id: ChallengeId,
    /// Challenger.
    pub from_user_id: UserId,
    /// Challenger's display name.
    pub from_username: String,
}

/// Expired challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeExpired {
    /// Challenge identifier.
    pub challenge_id: ChallengeId,
    /// Display name of the other party.
    pub username: String,
}

/// Match start, one per player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStart {
    /// Match identifier.
    pub game_id: MatchId,
    /// Opponent identity.
    pub opponent_id: UserId,
    /// Opponent display name.
    pub opponent_username: String,
    /// Seat of the receiver (1 or 2).
    pub your_player: u8,
}

/// Round-start snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingForBids {
    /// Match identifier.
    pub game_id: MatchId,
    /// Round number.
    pub turn: u32,
    /// Player one balance.
    pub p1_balance: u32,
    /// Player two balance.
    pub p2_balance: u32,
    /// Player one position.
    pub p1_position: u32,
    /// Player two position.
    pub p2_position: u32,
}

/// Resolved round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResultInfo {
    /// Match identifier.
    pub game_id: MatchId,
    /// Round number.
    pub turn: u32,
    /// Player one bid.
    pub p1_bid: u32,
    /// Player two bid.
    pub p2_bid: u32,
    /// Player one position after movement.
    pub p1_position: u32,
    /// Player two position after movement.
    pub p2_position: u32,
    /// Player one balance after deduction.
    pub p1_balance: u32,
    /// Player two balance after deduction.
    pub p2_balance: u32,
    /// `P1_WINS_ROUND`, `P2_WINS_ROUND` or `DRAW`.
    pub result: String,
}

/// Match end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnd {
    /// Match identifier.
    pub game_id: MatchId,
    /// 1 = player one, 2 = player two, 3 = draw.
    pub winner: u8,
    /// Human-readable reason.
    pub reason: String,
}

/// Rematch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RematchReceived {
    /// Finished match.
    pub game_id: MatchId,
    /// Requesting user.
    pub from_user_id: UserId,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Decode an inbound text frame, telling unknown types apart from
    /// malformed frames.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::Malformed("missing type".to_string()))?;

        if !Self::TYPES.contains(&kind) {
            return Err(DecodeError::UnknownType(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Build an `error` envelope.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }
}
