//! Hub error taxonomy.

use crate::game::state::BidError;

/// Failure of a hub operation.
///
/// None of these stop the hub. Only the surfaced kinds reach the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// Bad input from the originator (bid out of range, bad target).
    #[error("{0}")]
    Validation(String),

    /// The request clashes with current state (busy target, duplicate challenge).
    #[error("{0}")]
    Conflict(String),

    /// Unknown challenge, match or user. Usually a late or duplicate action.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Acting on a challenge or match the user is not a party to.
    #[error("not a party to this {0}")]
    Unauthorized(&'static str),
}

impl HubError {
    /// Whether the originator gets an `error` envelope.
    pub fn is_surfaced(&self) -> bool {
        matches!(self, HubError::Validation(_) | HubError::Conflict(_))
    }
}

impl From<BidError> for HubError {
    fn from(err: BidError) -> Self {
        match err {
            BidError::MatchFinished => HubError::NotFound("live match"),
            other => HubError::Validation(other.to_string()),
        }
    }
}
