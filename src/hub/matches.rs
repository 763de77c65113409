//! Match Engine wiring
//!
//! Owns the match table and turns [`MatchState`] transitions into
//! notifications. Finished matches linger for the retention period so late
//! rematch requests still resolve, then a scheduled event removes them.

use std::collections::BTreeMap;
use chrono::Utc;
use tracing::{debug, info};

use crate::core::ids::{MatchId, UserId};
use crate::game::state::{BidOutcome, MatchEnd, MatchState, Seat};
use crate::hub::core::{Hub, HubEvent};
use crate::hub::error::HubError;
use crate::hub::registry::User;
use crate::network::protocol::{
    GameEnd, GameStart, RematchReceived, RoundResultInfo, ServerMessage, WaitingForBids,
};

/// All stored matches, live and recently finished.
#[derive(Debug, Default)]
pub struct MatchTable {
    matches: BTreeMap<MatchId, MatchState>,
}

impl MatchTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a match.
    pub fn insert(&mut self, state: MatchState) {
        self.matches.insert(state.id, state);
    }

    /// Look up a match.
    pub fn get(&self, id: &MatchId) -> Option<&MatchState> {
        self.matches.get(id)
    }

    /// Look up a match mutably.
    pub fn get_mut(&mut self, id: &MatchId) -> Option<&mut MatchState> {
        self.matches.get_mut(id)
    }

    /// Drop a match.
    pub fn remove(&mut self, id: &MatchId) -> Option<MatchState> {
        self.matches.remove(id)
    }

    /// Every match `user` is seated in.
    pub fn ids_involving(&self, user: &UserId) -> Vec<MatchId> {
        self.matches.values()
            .filter(|m| m.seat_of(user).is_some())
            .map(|m| m.id)
            .collect()
    }

    /// Number of stored matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// No stored matches.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl Hub {
    /// Seat `player_one` and `player_two` in a new match and announce it.
    pub(super) fn start_match(&mut self, player_one: UserId, player_two: UserId) -> MatchId {
        let match_id = MatchId::new_v4();
        self.matches.insert(MatchState::new(
            match_id,
            player_one,
            player_two,
            self.config.rules,
            Utc::now(),
        ));
        self.registry.set_match(&player_one, Some(match_id));
        self.registry.set_match(&player_two, Some(match_id));

        for (seat, user) in [(Seat::One, player_one), (Seat::Two, player_two)] {
            let opponent = if seat == Seat::One { player_two } else { player_one };
            self.outbox.send(&user, ServerMessage::GameStart(GameStart {
                game_id: match_id,
                opponent_id: opponent,
                opponent_username: self.registry.username(&opponent),
                your_player: seat.number(),
            }));
        }

        self.send_snapshot(match_id);
        self.broadcast_users();

        info!(
            "Match started: {} ({} vs {})",
            match_id,
            self.registry.username(&player_one),
            self.registry.username(&player_two)
        );
        match_id
    }

    fn send_snapshot(&mut self, match_id: MatchId) {
        let Some(state) = self.matches.get(&match_id) else {
            return;
        };
        let snapshot = state.snapshot();
        let message = ServerMessage::WaitingForBids(WaitingForBids {
            game_id: match_id,
            turn: snapshot.round,
            p1_balance: snapshot.balances[0],
            p2_balance: snapshot.balances[1],
            p1_position: snapshot.positions[0],
            p2_position: snapshot.positions[1],
        });
        self.outbox.send_each(&state.players(), &message);
    }

    pub(super) fn handle_submit_bid(&mut self, user: UserId, game_id: MatchId, bid: i64) -> Result<(), HubError> {
        let state = self.matches.get_mut(&game_id).ok_or(HubError::NotFound("match"))?;
        let seat = state.seat_of(&user).ok_or(HubError::Unauthorized("match"))?;
        let players = state.players();

        let report = match state.submit_bid(seat, bid, Utc::now())? {
            BidOutcome::Waiting => {
                debug!("Bid stored for {} in {} (seat {})", user, game_id, seat.number());
                return Ok(());
            }
            BidOutcome::Resolved(report) => report,
        };

        let record = report.record;
        debug!(
            "Round {} of {} resolved: {:?} -> {}",
            record.round, game_id, record.bids, record.result.as_str()
        );

        self.outbox.send_each(&players, &ServerMessage::RoundResult(RoundResultInfo {
            game_id,
            turn: record.round,
            p1_bid: record.bids[0],
            p2_bid: record.bids[1],
            p1_position: record.positions[0],
            p2_position: record.positions[1],
            p1_balance: report.balances[0],
            p2_balance: report.balances[1],
            result: record.result.as_str().to_string(),
        }));

        match report.end {
            Some(end) => self.conclude_match(game_id, players, end),
            None => self.send_snapshot(game_id),
        }
        Ok(())
    }

    /// Teardown shared by a terminal round and a resignation.
    fn conclude_match(&mut self, match_id: MatchId, players: [UserId; 2], end: MatchEnd) {
        self.outbox.send_each(&players, &ServerMessage::GameEnd(GameEnd {
            game_id: match_id,
            winner: end.winner.map_or(0, |w| w.code()),
            reason: end.reason.as_str().to_string(),
        }));

        for player in &players {
            self.registry.clear_match_if(player, match_id);
        }
        self.broadcast_users();

        self.scheduler.schedule(self.config.match_retention, HubEvent::RemoveMatch { match_id });

        info!("Match ended: {} ({:?}, {})", match_id, end.winner, end.reason.as_str());
    }

    pub(super) fn handle_resign(&mut self, user: UserId, game_id: MatchId) -> Result<(), HubError> {
        let state = self.matches.get_mut(&game_id).ok_or(HubError::NotFound("match"))?;
        let seat = state.seat_of(&user).ok_or(HubError::Unauthorized("match"))?;
        let players = state.players();

        match state.resign(seat, Utc::now()) {
            Some(end) => {
                info!("{} resigned {}", user, game_id);
                self.conclude_match(game_id, players, end);
            }
            None => debug!("Resign on finished match {} ignored", game_id),
        }
        Ok(())
    }

    pub(super) fn handle_rematch(&mut self, user: UserId, game_id: MatchId) -> Result<(), HubError> {
        let state = self.matches.get_mut(&game_id).ok_or(HubError::NotFound("match"))?;
        let seat = state.seat_of(&user).ok_or(HubError::Unauthorized("match"))?;

        // Recorded in any state; only a finished match can be accepted
        state.request_rematch(seat);
        let opponent = state.player(seat.other());

        self.outbox.send(&opponent, ServerMessage::RematchReceived(RematchReceived {
            game_id,
            from_user_id: user,
        }));

        info!("Rematch requested for {} by {}", game_id, self.registry.username(&user));
        Ok(())
    }

    pub(super) fn handle_accept_rematch(&mut self, user: UserId, game_id: MatchId) -> Result<(), HubError> {
        let state = self.matches.get(&game_id).ok_or(HubError::NotFound("match"))?;
        let seat = state.seat_of(&user).ok_or(HubError::Unauthorized("match"))?;
        if !state.is_finished() || state.rematch_requested_by() != Some(seat.other()) {
            return Err(HubError::NotFound("rematch request"));
        }

        let [player_one, player_two] = state.players();
        for player in [player_one, player_two] {
            let live = self.registry.get(&player).ok_or(HubError::NotFound("user"))?;
            if live.in_game() {
                return Err(HubError::Conflict("Player is already in a game".to_string()));
            }
        }

        if let Some(state) = self.matches.get_mut(&game_id) {
            state.clear_rematch_request();
        }

        info!("Rematch accepted for {}", game_id);
        self.start_match(player_one, player_two);
        Ok(())
    }

    /// Terminate and drop every match `user` is seated in.
    pub(super) fn abandon_matches_of(&mut self, user: &User) {
        for match_id in self.matches.ids_involving(&user.id) {
            let Some(mut state) = self.matches.remove(&match_id) else {
                continue;
            };
            let Some(seat) = state.seat_of(&user.id) else {
                continue;
            };

            if state.abandon(Utc::now()) {
                let opponent = state.player(seat.other());
                self.registry.clear_match_if(&opponent, match_id);
                self.outbox.send(&opponent, ServerMessage::OpponentDisconnected { game_id: match_id });
                info!("Match abandoned: {} ({} left)", match_id, user.username);
            } else {
                debug!("Finished match {} dropped early", match_id);
            }
        }
    }

    /// Drop a finished match once its retention period is over.
    pub(super) fn remove_finished_match(&mut self, match_id: MatchId) {
        if self.matches.get(&match_id).is_some_and(|m| m.is_finished()) {
            self.matches.remove(&match_id);
            debug!("Match {} removed", match_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::hub::harness::{drain, TestHub};
    use crate::network::protocol::ClientMessage;

    #[tokio::test(start_paused = true)]
    async fn test_accept_starts_match() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        let state = t.hub.get_match(&game_id).unwrap();
        assert_eq!(state.players(), [alice.id, bob.id]);
        assert!(t.hub.user(&alice.id).unwrap().in_game());
        assert!(t.hub.user(&bob.id).unwrap().in_game());
        assert_eq!(t.hub.challenge_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_start_messages() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();

        let challenge_id = t.challenge(&mut alice, &mut bob);
        t.accept(&bob, challenge_id);

        let to_alice = drain(&mut alice.rx);
        let to_bob = drain(&mut bob.rx);

        let game_id = match &to_alice[0] {
            ServerMessage::GameStart(start) => {
                assert_eq!(start.opponent_id, bob.id);
                assert_eq!(start.your_player, 1);
                start.game_id
            }
            other => panic!("expected game_start, got {:?}", other),
        };
        match &to_bob[0] {
            ServerMessage::GameStart(start) => {
                assert_eq!(start.opponent_id, alice.id);
                assert_eq!(start.your_player, 2);
            }
            other => panic!("expected game_start, got {:?}", other),
        }

        let expected = ServerMessage::WaitingForBids(WaitingForBids {
            game_id,
            turn: 1,
            p1_balance: 20,
            p2_balance: 20,
            p1_position: 0,
            p2_position: 0,
        });
        assert_eq!(to_alice[1], expected);
        assert_eq!(to_bob[1], expected);
        assert!(matches!(to_alice[2], ServerMessage::UsersUpdate(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_resolution_broadcast() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.bid(&alice, game_id, 5);
        assert!(drain(&mut alice.rx).is_empty());
        assert!(drain(&mut bob.rx).is_empty());

        t.bid(&bob, game_id, 3);
        let to_alice = drain(&mut alice.rx);
        assert_eq!(to_alice.len(), 2);
        assert_eq!(to_alice[0], ServerMessage::RoundResult(RoundResultInfo {
            game_id,
            turn: 1,
            p1_bid: 5,
            p2_bid: 3,
            p1_position: 1,
            p2_position: 0,
            p1_balance: 15,
            p2_balance: 17,
            result: "P1_WINS_ROUND".to_string(),
        }));
        assert_eq!(to_alice[1], ServerMessage::WaitingForBids(WaitingForBids {
            game_id,
            turn: 2,
            p1_balance: 15,
            p2_balance: 17,
            p1_position: 1,
            p2_position: 0,
        }));
        assert_eq!(drain(&mut bob.rx), to_alice);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tie_round() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.bid(&alice, game_id, 5);
        t.bid(&bob, game_id, 5);

        match &drain(&mut alice.rx)[0] {
            ServerMessage::RoundResult(info) => {
                assert_eq!((info.p1_position, info.p2_position), (0, 0));
                assert_eq!((info.p1_balance, info.p2_balance), (15, 15));
                assert_eq!(info.result, "DRAW");
            }
            other => panic!("expected round_result, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_bid_surfaces_error() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.bid(&alice, game_id, 21);
        t.bid(&alice, game_id, -1);
        assert_eq!(drain(&mut alice.rx), vec![
            ServerMessage::error("Bid exceeds your balance"),
            ServerMessage::error("Bid must be non-negative"),
        ]);
        assert!(drain(&mut bob.rx).is_empty());

        let state = t.hub.get_match(&game_id).unwrap();
        assert_eq!(state.pending_bid(Seat::One), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outsider_bid_is_dropped() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let mut carol = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);
        drain(&mut carol.rx);

        t.bid(&carol, game_id, 1);
        t.bid(&carol, MatchId::new_v4(), 1);
        assert!(drain(&mut carol.rx).is_empty());
        assert_eq!(t.hub.get_match(&game_id).unwrap().pending_bid(Seat::One), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_runs_to_goal() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        for _ in 0..3 {
            t.bid(&alice, game_id, 2);
            t.bid(&bob, game_id, 1);
        }

        let to_bob = drain(&mut bob.rx);
        let end = to_bob.iter().find_map(|m| match m {
            ServerMessage::GameEnd(end) => Some(end.clone()),
            _ => None,
        });
        assert_eq!(end, Some(GameEnd {
            game_id,
            winner: 1,
            reason: "reached final step".to_string(),
        }));

        // Both players idle again, match retained
        assert!(!t.hub.user(&alice.id).unwrap().in_game());
        assert!(!t.hub.user(&bob.id).unwrap().in_game());
        assert!(t.hub.get_match(&game_id).unwrap().is_finished());

        // Late bids are stale and dropped
        drain(&mut alice.rx);
        t.bid(&alice, game_id, 1);
        assert!(drain(&mut alice.rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_match_removed_after_retention() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.resign(&alice, game_id);
        assert_eq!(t.hub.match_count(), 1);
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(t.events.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(2)).await;
        let event = t.next_event().await;
        assert!(matches!(event, HubEvent::RemoveMatch { match_id } if match_id == game_id));

        t.hub.handle(event);
        assert_eq!(t.hub.match_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resign_before_any_bid() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.resign(&alice, game_id);
        let expected = ServerMessage::GameEnd(GameEnd {
            game_id,
            winner: 2,
            reason: "opponent resigned".to_string(),
        });
        assert_eq!(drain(&mut alice.rx)[0], expected);
        assert_eq!(drain(&mut bob.rx)[0], expected);

        // Second resign is ignored
        t.resign(&bob, game_id);
        assert!(drain(&mut bob.rx).is_empty());
        assert_eq!(t.hub.get_match(&game_id).unwrap().history().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_match() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.bid(&alice, game_id, 4);
        t.disconnect(&alice);

        let to_bob = drain(&mut bob.rx);
        assert_eq!(to_bob[0], ServerMessage::OpponentDisconnected { game_id });
        match &to_bob[1] {
            ServerMessage::UsersUpdate(update) => {
                assert_eq!(update.users.len(), 1);
                assert!(!update.users[0].in_game);
            }
            other => panic!("expected users_update, got {:?}", other),
        }

        assert_eq!(t.hub.match_count(), 0);
        assert_eq!(t.hub.user_count(), 1);
        assert!(!t.hub.user(&bob.id).unwrap().in_game());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_after_finish_drops_retained_match() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        t.resign(&alice, game_id);
        drain(&mut bob.rx);
        assert_eq!(t.hub.match_count(), 1);

        t.disconnect(&alice);

        // Already over, so no opponent_disconnected
        match drain(&mut bob.rx).as_slice() {
            [ServerMessage::UsersUpdate(update)] => assert_eq!(update.users.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.hub.match_count(), 0);
        assert!(t.hub.get_match(&game_id).is_none());
        assert!(!t.hub.user(&bob.id).unwrap().in_game());

        // The pending retention timer finds nothing to remove
        t.hub.handle(HubEvent::RemoveMatch { match_id: game_id });
        assert_eq!(t.hub.match_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rematch_requires_explicit_accept() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);

        // Forwarded mid-match, but cannot be accepted until the match is over
        t.send(&alice, ClientMessage::Rematch { game_id });
        assert!(drain(&mut alice.rx).is_empty());
        assert_eq!(
            drain(&mut bob.rx),
            vec![ServerMessage::RematchReceived(RematchReceived { game_id, from_user_id: alice.id })]
        );
        t.send(&bob, ClientMessage::AcceptRematch { game_id });
        assert!(drain(&mut bob.rx).is_empty());
        assert_eq!(t.hub.match_count(), 1);

        t.resign(&bob, game_id);
        drain(&mut alice.rx);
        drain(&mut bob.rx);

        // The requester cannot accept their own request
        t.send(&alice, ClientMessage::Rematch { game_id });
        assert_eq!(
            drain(&mut bob.rx),
            vec![ServerMessage::RematchReceived(RematchReceived { game_id, from_user_id: alice.id })]
        );
        t.send(&alice, ClientMessage::AcceptRematch { game_id });
        assert_eq!(t.hub.match_count(), 1);

        t.send(&bob, ClientMessage::AcceptRematch { game_id });
        assert_eq!(t.hub.match_count(), 2);

        let to_alice = drain(&mut alice.rx);
        let rematch_id = match &to_alice[0] {
            ServerMessage::GameStart(start) => {
                assert_eq!(start.your_player, 1);
                start.game_id
            }
            other => panic!("expected game_start, got {:?}", other),
        };
        assert_ne!(rematch_id, game_id);
        assert_eq!(t.hub.user(&bob.id).unwrap().match_id, Some(rematch_id));

        // Retention removal of the old match leaves the new one alone
        t.hub.handle(HubEvent::RemoveMatch { match_id: game_id });
        t.hub.handle(HubEvent::RemoveMatch { match_id: rematch_id });
        assert_eq!(t.hub.match_count(), 1);
        assert!(t.hub.get_match(&rematch_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rematch_refused_when_player_busy() {
        let mut t = TestHub::new();
        let mut alice = t.connect();
        let mut bob = t.connect();
        let mut carol = t.connect();
        let game_id = t.start_match(&mut alice, &mut bob);
        t.resign(&alice, game_id);

        t.send(&alice, ClientMessage::Rematch { game_id });
        t.start_match(&mut alice, &mut carol);
        drain(&mut bob.rx);

        t.send(&bob, ClientMessage::AcceptRematch { game_id });
        assert_eq!(drain(&mut bob.rx), vec![ServerMessage::error("Player is already in a game")]);
    }
}
