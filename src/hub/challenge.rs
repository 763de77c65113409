//! Challenge Manager
//!
//! Pending 1:1 invitations and their time-based expiry. At most one
//! challenge exists per ordered (sender, recipient) pair.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

use crate::core::ids::{ChallengeId, UserId};
use crate::hub::core::Hub;
use crate::hub::error::HubError;
use crate::network::protocol::{ChallengeExpired, ChallengeReceived, ServerMessage};

/// A pending invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Challenge identifier.
    pub id: ChallengeId,
    /// Challenger (seat one if accepted).
    pub from: UserId,
    /// Challenged user.
    pub to: UserId,
    /// Creation time.
    pub created_at: Instant,
}

/// Table of pending challenges.
#[derive(Debug, Default)]
pub struct ChallengeBook {
    challenges: BTreeMap<ChallengeId, Challenge>,
}

impl ChallengeBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `from` already has a pending challenge to `to`.
    pub fn has_pending(&self, from: &UserId, to: &UserId) -> bool {
        self.challenges.values().any(|c| c.from == *from && c.to == *to)
    }

    /// Store a new challenge.
    pub fn insert(&mut self, from: UserId, to: UserId, now: Instant) -> Result<ChallengeId, HubError> {
        if self.has_pending(&from, &to) {
            return Err(HubError::Conflict(
                "You already have a pending challenge to this user".to_string(),
            ));
        }

        let id = ChallengeId::new_v4();
        self.challenges.insert(id, Challenge { id, from, to, created_at: now });
        Ok(id)
    }

    /// Remove a challenge on behalf of its recipient.
    pub fn take_addressed_to(&mut self, id: &ChallengeId, user: &UserId) -> Result<Challenge, HubError> {
        match self.challenges.get(id) {
            None => Err(HubError::NotFound("challenge")),
            Some(c) if c.to != *user => Err(HubError::Unauthorized("challenge")),
            Some(_) => self.challenges.remove(id).ok_or(HubError::NotFound("challenge")),
        }
    }

    /// Remove and return every challenge older than `ttl`.
    pub fn take_expired(&mut self, now: Instant, ttl: Duration) -> Vec<Challenge> {
        let expired: Vec<ChallengeId> = self.challenges.values()
            .filter(|c| now.saturating_duration_since(c.created_at) > ttl)
            .map(|c| c.id)
            .collect();

        expired.iter()
            .filter_map(|id| self.challenges.remove(id))
            .collect()
    }

    /// Remove and return every challenge `user` sent or received.
    pub fn remove_involving(&mut self, user: &UserId) -> Vec<Challenge> {
        let involved: Vec<ChallengeId> = self.challenges.values()
            .filter(|c| c.from == *user || c.to == *user)
            .map(|c| c.id)
            .collect();

        involved.iter()
            .filter_map(|id| self.challenges.remove(id))
            .collect()
    }

    /// Number of pending challenges.
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    /// No pending challenges.
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

impl Hub {
    pub(super) fn handle_challenge(&mut self, from: UserId, target: UserId) -> Result<(), HubError> {
        if from == target {
            return Err(HubError::Validation("You cannot challenge yourself".to_string()));
        }

        let target_user = self.registry.get(&target).ok_or(HubError::NotFound("user"))?;
        if target_user.in_game() {
            return Err(HubError::Conflict("User is already in a game".to_string()));
        }
        if self.registry.get(&from).is_some_and(|u| u.in_game()) {
            return Err(HubError::Conflict("You are already in a game".to_string()));
        }

        let challenge_id = self.challenges.insert(from, target, Instant::now())?;
        let from_username = self.registry.username(&from);

        self.outbox.send(&target, ServerMessage::ChallengeReceived(ChallengeReceived {
            challenge_id,
            from_user_id: from,
            from_username: from_username.clone(),
        }));

        info!("Challenge created: {} -> {}", from_username, self.registry.username(&target));
        Ok(())
    }

    pub(super) fn handle_accept_challenge(&mut self, user: UserId, challenge_id: ChallengeId) -> Result<(), HubError> {
        let challenge = self.challenges.take_addressed_to(&challenge_id, &user)?;

        let challenger = self.registry.get(&challenge.from).ok_or(HubError::NotFound("user"))?;
        if challenger.in_game() {
            return Err(HubError::Conflict("Challenger is already in a game".to_string()));
        }
        if self.registry.get(&user).is_some_and(|u| u.in_game()) {
            return Err(HubError::Conflict("You are already in a game".to_string()));
        }

        info!("Challenge {} accepted", challenge_id);
        self.start_match(challenge.from, challenge.to);
        Ok(())
    }

    pub(super) fn handle_decline_challenge(&mut self, user: UserId, challenge_id: ChallengeId) -> Result<(), HubError> {
        let challenge = self.challenges.take_addressed_to(&challenge_id, &user)?;

        self.outbox.send(&challenge.from, ServerMessage::ChallengeDeclined { challenge_id });

        info!(
            "Challenge declined: {} declined {}",
            self.registry.username(&user),
            self.registry.username(&challenge.from)
        );
        Ok(())
    }

    /// Expire challenges older than the configured lifetime.
    pub(super) fn sweep_expired(&mut self, now: Instant) {
        for challenge in self.challenges.take_expired(now, self.config.challenge_expiry) {
            self.outbox.send(&challenge.from, ServerMessage::ChallengeExpired(ChallengeExpired {
                challenge_id: challenge.id,
                username: self.registry.username(&challenge.to),
            }));

            info!(
                "Challenge expired: {} -> {}",
                self.registry.username(&challenge.from),
                self.registry.username(&challenge.to)
            );
        }
    }
}
