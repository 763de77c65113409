//! In-process driver for hub tests. Feeds events straight into a [`Hub`]
//! and exposes each fake connection's outbound channel.

use tokio::sync::mpsc;

use crate::core::ids::{ChallengeId, ConnectionId, MatchId, UserId};
use crate::hub::core::{Hub, HubConfig, HubEvent};
use crate::network::protocol::{ClientMessage, ServerMessage};

pub(crate) struct Client {
    pub id: UserId,
    pub connection: ConnectionId,
    pub rx: mpsc::Receiver<ServerMessage>,
}

pub(crate) struct TestHub {
    pub hub: Hub,
    pub events: mpsc::Receiver<HubEvent>,
    _tx: mpsc::Sender<HubEvent>,
    next_connection: u64,
}

/// Everything queued for a client right now.
pub(crate) fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

impl TestHub {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        let (tx, events) = mpsc::channel(64);
        Self {
            hub: Hub::new(config, tx.downgrade()),
            events,
            _tx: tx,
            next_connection: 1,
        }
    }

    /// Connect with an outbound buffer of 64.
    pub fn connect(&mut self) -> Client {
        self.connect_with_buffer(64)
    }

    pub fn connect_with_buffer(&mut self, capacity: usize) -> Client {
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;

        let (outbound, mut rx) = mpsc::channel(capacity);
        self.hub.handle(HubEvent::Connected { connection, outbound });

        let id = match rx.try_recv() {
            Ok(ServerMessage::Welcome(welcome)) => welcome.user_id,
            other => panic!("expected welcome, got {:?}", other),
        };
        drain(&mut rx);

        Client { id, connection, rx }
    }

    pub fn send(&mut self, client: &Client, message: ClientMessage) {
        self.hub.handle(HubEvent::Message { connection: client.connection, message });
    }

    pub fn disconnect(&mut self, client: &Client) {
        self.hub.handle(HubEvent::Disconnected { connection: client.connection });
    }

    /// `from` challenges `to`; both inboxes are drained.
    pub fn challenge(&mut self, from: &mut Client, to: &mut Client) -> ChallengeId {
        self.send(from, ClientMessage::Challenge { target_user_id: to.id });
        drain(&mut from.rx);

        drain(&mut to.rx).into_iter()
            .find_map(|m| match m {
                ServerMessage::ChallengeReceived(received) => Some(received.challenge_id),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no challenge_received for {}", to.id))
    }

    pub fn accept(&mut self, client: &Client, challenge_id: ChallengeId) {
        self.send(client, ClientMessage::AcceptChallenge { challenge_id });
    }

    /// Challenge, accept and drain; `one` takes seat one.
    pub fn start_match(&mut self, one: &mut Client, two: &mut Client) -> MatchId {
        let challenge_id = self.challenge(one, two);
        self.accept(two, challenge_id);
        drain(&mut two.rx);

        drain(&mut one.rx).into_iter()
            .find_map(|m| match m {
                ServerMessage::GameStart(start) => Some(start.game_id),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no game_start for {}", one.id))
    }

    pub fn bid(&mut self, client: &Client, game_id: MatchId, bid: i64) {
        self.send(client, ClientMessage::SubmitBid { game_id, bid });
    }

    pub fn resign(&mut self, client: &Client, game_id: MatchId) {
        self.send(client, ClientMessage::Resign { game_id });
    }

    /// Next event the hub scheduled for itself.
    pub async fn next_event(&mut self) -> HubEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => panic!("hub queue closed"),
        }
    }
}
