//! Session Hub
//!
//! The single serialized decision point. Connection tasks, the expiry ticker
//! and deferred timers all push [`HubEvent`]s into one queue; the hub
//! consumes it one event at a time and is the only writer of the user,
//! challenge and match tables. Handlers never await.

use std::time::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::ids::{ConnectionId, MatchId, UserId};
use crate::game::rules::MatchRules;
use crate::game::state::MatchState;
use crate::hub::challenge::ChallengeBook;
use crate::hub::error::HubError;
use crate::hub::matches::MatchTable;
use crate::hub::names::generate_username;
use crate::hub::outbox::Outbox;
use crate::hub::registry::{Registry, User};
use crate::hub::scheduler::{spawn_expiry_ticker, Scheduler};
use crate::network::protocol::{
    ChallengeExpired, ClientMessage, ServerMessage, UsersUpdate, Welcome,
};
use crate::{CHALLENGE_EXPIRY, EXPIRY_SWEEP_PERIOD, MATCH_RETENTION};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Rules for every match.
    pub rules: MatchRules,
    /// Pending challenge lifetime.
    pub challenge_expiry: Duration,
    /// Time a finished match stays queryable.
    pub match_retention: Duration,
    /// Expiry sweep period.
    pub sweep_period: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            rules: MatchRules::default(),
            challenge_expiry: CHALLENGE_EXPIRY,
            match_retention: MATCH_RETENTION,
            sweep_period: EXPIRY_SWEEP_PERIOD,
        }
    }
}

/// Everything the hub reacts to.
#[derive(Debug)]
pub enum HubEvent {
    /// A connection finished its handshake.
    Connected {
        /// Transport handle.
        connection: ConnectionId,
        /// Bounded channel to the connection's writer.
        outbound: mpsc::Sender<ServerMessage>,
    },

    /// A connection closed.
    Disconnected {
        /// Transport handle.
        connection: ConnectionId,
    },

    /// A decoded client message.
    Message {
        /// Originating connection.
        connection: ConnectionId,
        /// Decoded envelope.
        message: ClientMessage,
    },

    /// A frame that could not be decoded.
    Malformed {
        /// Originating connection.
        connection: ConnectionId,
        /// Decoder diagnostics (logged only).
        reason: String,
    },

    /// Expiry sweep tick.
    Tick,

    /// Deferred removal of a finished match.
    RemoveMatch {
        /// Match to drop.
        match_id: MatchId,
    },

    /// Stop the hub after notifying every user.
    Shutdown {
        /// Reason sent to clients.
        reason: String,
    },
}

/// The session hub.
pub struct Hub {
    pub(super) config: HubConfig,
    pub(super) registry: Registry,
    pub(super) challenges: ChallengeBook,
    pub(super) matches: MatchTable,
    pub(super) outbox: Outbox,
    pub(super) scheduler: Scheduler,
    rng: StdRng,
}

impl Hub {
    /// Create a hub whose deferred events go back into `events`.
    pub fn new(config: HubConfig, events: mpsc::WeakSender<HubEvent>) -> Self {
        Self {
            config,
            registry: Registry::new(),
            challenges: ChallengeBook::new(),
            matches: MatchTable::new(),
            outbox: Outbox::new(),
            scheduler: Scheduler::new(events),
            rng: StdRng::from_entropy(),
        }
    }

    /// Spawn a hub with its queue and expiry ticker.
    ///
    /// Returns the producer side of the queue and the hub task.
    pub fn spawn(config: HubConfig, queue_capacity: usize) -> (mpsc::Sender<HubEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let sweep_period = config.sweep_period;
        let hub = Hub::new(config, tx.downgrade());

        spawn_expiry_ticker(tx.clone(), sweep_period);
        let handle = tokio::spawn(hub.run(rx));

        (tx, handle)
    }

    /// Consume the queue until it closes or a shutdown event arrives.
    pub async fn run(mut self, mut events: mpsc::Receiver<HubEvent>) {
        info!("Hub started");

        while let Some(event) = events.recv().await {
            let stop = matches!(event, HubEvent::Shutdown { .. });
            self.handle(event);
            if stop {
                break;
            }
        }

        info!("Hub stopped ({} users online)", self.registry.len());
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected { connection, outbound } => {
                self.handle_connect(connection, outbound);
            }
            HubEvent::Disconnected { connection } => {
                if let Some(user) = self.registry.user_for(connection) {
                    self.handle_disconnect(user);
                }
            }
            HubEvent::Message { connection, message } => {
                self.dispatch(connection, message);
            }
            HubEvent::Malformed { connection, reason } => {
                debug!("Malformed frame from {}: {}", connection, reason);
                if let Some(user) = self.registry.user_for(connection) {
                    self.outbox.send(&user, ServerMessage::error("Invalid message format"));
                }
            }
            HubEvent::Tick => {
                self.sweep_expired(Instant::now());
            }
            HubEvent::RemoveMatch { match_id } => {
                self.remove_finished_match(match_id);
            }
            HubEvent::Shutdown { reason } => {
                info!("Hub shutting down: {}", reason);
                self.outbox.broadcast(&ServerMessage::Shutdown { reason });
            }
        }

        self.evict_overflowed();
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    fn handle_connect(&mut self, connection: ConnectionId, outbound: mpsc::Sender<ServerMessage>) {
        let username = generate_username(&mut self.rng);
        let user_id = self.registry.register(connection, username.clone());
        self.outbox.attach(user_id, outbound);

        self.outbox.send(&user_id, ServerMessage::Welcome(Welcome {
            user_id,
            username: username.clone(),
        }));
        self.broadcast_users();

        info!("User connected: {} ({}) on {}", username, user_id, connection);
    }

    pub(super) fn handle_disconnect(&mut self, user_id: UserId) {
        let Some(user) = self.registry.get(&user_id).cloned() else {
            return;
        };
        info!("User disconnected: {} ({})", user.username, user_id);

        self.outbox.detach(&user_id);
        self.abandon_matches_of(&user);

        for challenge in self.challenges.remove_involving(&user_id) {
            if challenge.from == user_id {
                // `username` names the other party, here the departed sender
                self.outbox.send(&challenge.to, ServerMessage::ChallengeExpired(ChallengeExpired {
                    challenge_id: challenge.id,
                    username: user.username.clone(),
                }));
            }
        }

        self.registry.remove(&user_id);
        self.broadcast_users();
    }

    fn evict_overflowed(&mut self) {
        loop {
            let evicted = self.outbox.take_overflowed();
            if evicted.is_empty() {
                break;
            }
            for user in evicted {
                warn!("Dropping slow consumer {}", user);
                self.handle_disconnect(user);
            }
        }
    }

    /// Push the online-user list to every live user.
    pub(super) fn broadcast_users(&mut self) {
        let message = ServerMessage::UsersUpdate(UsersUpdate {
            users: self.registry.summaries(),
        });
        self.outbox.send_each(&self.registry.ids(), &message);
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    fn dispatch(&mut self, connection: ConnectionId, message: ClientMessage) {
        let Some(user) = self.registry.user_for(connection) else {
            debug!("Message from unregistered {}", connection);
            return;
        };

        let result = match message {
            ClientMessage::Challenge { target_user_id } => {
                self.handle_challenge(user, target_user_id)
            }
            ClientMessage::AcceptChallenge { challenge_id } => {
                self.handle_accept_challenge(user, challenge_id)
            }
            ClientMessage::DeclineChallenge { challenge_id } => {
                self.handle_decline_challenge(user, challenge_id)
            }
            ClientMessage::SubmitBid { game_id, bid } => {
                self.handle_submit_bid(user, game_id, bid)
            }
            ClientMessage::Resign { game_id } => self.handle_resign(user, game_id),
            ClientMessage::Rematch { game_id } => self.handle_rematch(user, game_id),
            ClientMessage::AcceptRematch { game_id } => {
                self.handle_accept_rematch(user, game_id)
            }
            ClientMessage::Ping { timestamp } => {
                self.outbox.send(&user, ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
                });
                Ok(())
            }
        };

        if let Err(err) = result {
            self.report(user, err);
        }
    }

    fn report(&mut self, user: UserId, err: HubError) {
        if err.is_surfaced() {
            debug!("Rejected request from {}: {}", user, err);
            self.outbox.send(&user, ServerMessage::error(err.to_string()));
        } else {
            debug!("Dropped request from {}: {}", user, err);
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    /// Number of live users.
    pub fn user_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of pending challenges.
    pub fn challenge_count(&self) -> usize {
        self.challenges.len()
    }

    /// Number of stored matches, finished ones included.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Look up a user.
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.registry.get(id)
    }

    /// Look up a match.
    pub fn get_match(&self, id: &MatchId) -> Option<&MatchState> {
        self.matches.get(id)
    }
}
