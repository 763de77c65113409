//! Identity Registry
//!
//! Maps live connections to user records. A user exists exactly as long as
//! its connection.

use std::collections::BTreeMap;

use crate::core::ids::{ConnectionId, MatchId, UserId};
use crate::network::protocol::UserSummary;

/// A live user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Identity.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Connection this user lives on.
    pub connection: ConnectionId,
    /// Match the user currently plays in.
    pub match_id: Option<MatchId>,
}

impl User {
    /// Whether the user is in a match.
    pub fn in_game(&self) -> bool {
        self.match_id.is_some()
    }
}

/// Table of live users.
#[derive(Debug, Default)]
pub struct Registry {
    users: BTreeMap<UserId, User>,
    by_connection: BTreeMap<ConnectionId, UserId>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh identity for `connection`.
    pub fn register(&mut self, connection: ConnectionId, username: String) -> UserId {
        let id = UserId::new_v4();
        self.users.insert(id, User {
            id,
            username,
            connection,
            match_id: None,
        });
        self.by_connection.insert(connection, id);
        id
    }

    /// Drop a user by identity.
    pub fn remove(&mut self, id: &UserId) -> Option<User> {
        let user = self.users.remove(id)?;
        self.by_connection.remove(&user.connection);
        Some(user)
    }

    /// User living on `connection`.
    pub fn user_for(&self, connection: ConnectionId) -> Option<UserId> {
        self.by_connection.get(&connection).copied()
    }

    /// Look up a user.
    pub fn get(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Display name, empty if the user is gone.
    pub fn username(&self, id: &UserId) -> String {
        self.users.get(id).map(|u| u.username.clone()).unwrap_or_default()
    }

    /// Point `id` at a match, or clear it.
    pub fn set_match(&mut self, id: &UserId, match_id: Option<MatchId>) {
        if let Some(user) = self.users.get_mut(id) {
            user.match_id = match_id;
        }
    }

    /// Clear `id`'s match pointer only if it still points at `match_id`.
    pub fn clear_match_if(&mut self, id: &UserId, match_id: MatchId) {
        if let Some(user) = self.users.get_mut(id) {
            if user.match_id == Some(match_id) {
                user.match_id = None;
            }
        }
    }

    /// Online list entries, ordered by id.
    pub fn summaries(&self) -> Vec<UserSummary> {
        self.users.values()
            .map(|u| UserSummary {
                user_id: u.id,
                username: u.username.clone(),
                in_game: u.in_game(),
            })
            .collect()
    }

    /// All live identities.
    pub fn ids(&self) -> Vec<UserId> {
        self.users.keys().copied().collect()
    }

    /// Number of live users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// No live users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
