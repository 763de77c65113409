//! Outbox
//!
//! Addressed and broadcast delivery from the hub to connection writers.
//! Every connection has a bounded buffer; a full buffer evicts the
//! connection instead of blocking the hub.

use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::core::ids::UserId;
use crate::network::protocol::ServerMessage;

/// Outbound channels keyed by user.
#[derive(Debug, Default)]
pub struct Outbox {
    peers: BTreeMap<UserId, mpsc::Sender<ServerMessage>>,
    overflowed: Vec<UserId>,
}

impl Outbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the writer channel of a freshly registered user.
    pub fn attach(&mut self, user: UserId, sender: mpsc::Sender<ServerMessage>) {
        self.peers.insert(user, sender);
    }

    /// Drop the writer channel. Closing it ends the connection's writer task.
    pub fn detach(&mut self, user: &UserId) {
        self.peers.remove(user);
    }

    /// Best-effort send to one user.
    pub fn send(&mut self, user: &UserId, message: ServerMessage) {
        let Some(sender) = self.peers.get(user) else {
            debug!("No outbound channel for {}", user);
            return;
        };

        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Outbound buffer full for {}, evicting", user);
                self.peers.remove(user);
                self.overflowed.push(*user);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound channel closed for {}", user);
            }
        }
    }

    /// Send the same message to several users.
    pub fn send_each(&mut self, users: &[UserId], message: &ServerMessage) {
        for user in users {
            self.send(user, message.clone());
        }
    }

    /// Send to every attached user.
    pub fn broadcast(&mut self, message: &ServerMessage) {
        let users: Vec<UserId> = self.peers.keys().copied().collect();
        self.send_each(&users, message);
    }

    /// Users evicted since the last call.
    pub fn take_overflowed(&mut self) -> Vec<UserId> {
        std::mem::take(&mut self.overflowed)
    }

    /// Number of attached users.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// No attached users.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
