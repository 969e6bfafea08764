//! Game session state machine and tick step

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::lobby::{LobbyEvent, PlayerId, PlayerRegistry};
use crate::ws::protocol::{InputVector, ServerMsg};

use super::minigame::Minigame;
use super::physics::{MovementParams, PhysicsSystem};
use super::snapshot;
use super::timers::SessionTimers;
use super::{EndReason, GameId, SessionState};

/// One seat in a session roster
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: PlayerId,
    /// Player was removed from the session
    pub left: bool,
}

/// A single match: fixed roster, state machine and timers
pub struct GameSession {
    pub id: GameId,
    pub minigame: Minigame,
    pub seed: u32,
    state: SessionState,
    tick: u64,
    /// Countdown ticks left
    countdown_remaining: u64,
    /// Round ticks left
    round_remaining: u64,
    seats: Vec<Seat>,
    timers: SessionTimers,
    config: Arc<GameConfig>,
}

impl GameSession {
    /// Create a session in `waiting` with players seated in the given order
    pub fn new(
        id: GameId,
        player_ids: Vec<PlayerId>,
        minigame: Minigame,
        seed: u32,
        config: Arc<GameConfig>,
        events: mpsc::Sender<LobbyEvent>,
    ) -> Self {
        let seats = player_ids
            .into_iter()
            .map(|player_id| Seat {
                player_id,
                left: false,
            })
            .collect();

        Self {
            id,
            minigame,
            seed,
            state: SessionState::Waiting,
            tick: 0,
            countdown_remaining: config.ticks_in(config.countdown),
            round_remaining: config.ticks_in(config.round_duration),
            seats,
            timers: SessionTimers::new(id, events),
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[cfg(test)]
    pub fn round_remaining(&self) -> u64 {
        self.round_remaining
    }

    #[cfg(test)]
    pub fn timers(&self) -> &SessionTimers {
        &self.timers
    }

    /// Players still seated (not removed)
    pub fn seated(&self) -> impl Iterator<Item = &PlayerId> {
        self.seats.iter().filter(|s| !s.left).map(|s| &s.player_id)
    }

    pub fn is_seated(&self, player_id: &PlayerId) -> bool {
        self.seated().any(|id| id == player_id)
    }

    /// Send to every seated player; closed connections drop the message
    pub fn broadcast(&self, players: &PlayerRegistry, msg: ServerMsg) {
        for id in self.seated() {
            players.send(id, msg.clone());
        }
    }

    /// Notify each player of the match and arm the auto-start delay
    pub fn announce(&mut self, players: &PlayerRegistry) {
        let msg = ServerMsg::MatchFound {
            game_id: self.id,
            minigame: self.minigame,
            players: snapshot::roster(&self.seats, players),
        };
        self.broadcast(players, msg);
        self.timers.schedule_auto_start(self.config.auto_start_delay);
    }

    /// `waiting -> countdown`. No-op in any other state.
    pub fn start(&mut self, players: &PlayerRegistry) -> bool {
        if self.state != SessionState::Waiting {
            return false;
        }

        self.state = SessionState::Countdown;
        self.countdown_remaining = self.config.ticks_in(self.config.countdown);

        self.broadcast(
            players,
            ServerMsg::GameStart {
                game_id: self.id,
                minigame: self.minigame,
                minigame_type: self.minigame.kind(),
                seed: self.seed,
                players: snapshot::roster(&self.seats, players),
            },
        );

        self.timers.cancel_auto_start();
        self.timers.start_ticking(self.config.tick_period());
        self.timers.schedule_timeout(self.config.session_timeout);

        info!(game_id = self.id, minigame = ?self.minigame, "Session countdown started");
        true
    }

    /// Start early once every seated player is ready
    pub fn start_if_all_ready(&mut self, players: &PlayerRegistry) -> bool {
        if self.state != SessionState::Waiting {
            return false;
        }
        let all_ready = self
            .seated()
            .all(|id| players.get(id).map_or(false, |p| p.ready));
        all_ready && self.start(players)
    }

    /// Advance the session by one tick
    pub fn tick(&mut self, players: &mut PlayerRegistry) {
        match self.state {
            SessionState::Waiting | SessionState::Ended => return,
            SessionState::Countdown => {
                self.tick += 1;
                self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
                if self.countdown_remaining == 0 {
                    self.state = SessionState::Playing;
                    self.round_remaining = self.config.ticks_in(self.config.round_duration);
                    info!(game_id = self.id, tick = self.tick, "Session playing");
                }
            }
            SessionState::Playing => {
                self.tick += 1;
                self.round_remaining = self.round_remaining.saturating_sub(1);
                let dt = self.config.tick_period().as_secs_f32();
                self.update_physics(players, dt);

                if self.alive_count(players) <= 1 || self.round_remaining == 0 {
                    self.end(players, EndReason::Normal);
                    return;
                }
            }
        }

        let ticks_left = match self.state {
            SessionState::Countdown => self.countdown_remaining,
            _ => self.round_remaining,
        };
        let msg = snapshot::build_state(
            self.tick,
            ticks_left as f32 / self.config.tick_rate as f32,
            self.state,
            &self.seats,
            players,
        );
        self.broadcast(players, msg);
    }

    fn update_physics(&self, players: &mut PlayerRegistry, dt: f32) {
        let params = MovementParams::from(self.config.as_ref());
        for seat in self.seats.iter().filter(|s| !s.left) {
            if let Some(player) = players.get_mut(&seat.player_id) {
                if !player.alive {
                    continue;
                }
                let input = player.input;
                PhysicsSystem::integrate(
                    &mut player.position,
                    &mut player.velocity,
                    &input,
                    &params,
                    dt,
                );
            }
        }
    }

    fn alive_count(&self, players: &PlayerRegistry) -> usize {
        self.seated()
            .filter(|id| players.get(id).map_or(false, |p| p.alive))
            .count()
    }

    /// Store input for a seated, alive player while playing
    pub fn handle_input(
        &self,
        players: &mut PlayerRegistry,
        player_id: &PlayerId,
        input: InputVector,
    ) -> bool {
        if self.state != SessionState::Playing || !self.is_seated(player_id) {
            return false;
        }
        match players.get_mut(player_id) {
            Some(player) if player.alive => {
                player.input = input;
                true
            }
            _ => false,
        }
    }

    /// Remove a player; ends the session when fewer than two connected, alive players remain
    pub fn remove_player(&mut self, players: &mut PlayerRegistry, player_id: &PlayerId) -> bool {
        if self.state == SessionState::Ended {
            return false;
        }
        let Some(index) = self
            .seats
            .iter()
            .position(|s| !s.left && s.player_id == *player_id)
        else {
            return false;
        };

        self.seats[index].left = true;
        if let Some(player) = players.get_mut(player_id) {
            player.alive = false;
            player.release();
        }

        self.broadcast(
            players,
            ServerMsg::PlayerLeft {
                player_id: *player_id,
                player_index: index,
            },
        );

        let active = self
            .seated()
            .filter(|id| players.get(id).map_or(false, |p| p.is_active()))
            .count();

        info!(game_id = self.id, player_id = %player_id, remaining = active, "Player removed from session");

        if active < 2 {
            self.end(players, EndReason::Disconnect);
        }
        true
    }

    /// Enter `ended`. Runs at most once; returns false if already ended.
    pub fn end(&mut self, players: &mut PlayerRegistry, reason: EndReason) -> bool {
        if self.state == SessionState::Ended {
            debug!(game_id = self.id, "Session already ended");
            return false;
        }
        self.state = SessionState::Ended;
        self.timers.cancel_all();

        let placements = snapshot::placements(
            self.seats
                .iter()
                .filter_map(|s| players.get(&s.player_id))
                .filter(|p| p.connection.is_open()),
        );
        self.broadcast(players, ServerMsg::GameEnd { reason, placements });

        for seat in &self.seats {
            if let Some(player) = players.get_mut(&seat.player_id) {
                if player.game_id == Some(self.id) {
                    player.release();
                }
            }
        }

        info!(game_id = self.id, reason = ?reason, ticks = self.tick, "Session ended");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::game::physics::PhysicsSystem;
    use crate::lobby::PlayerConnection;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        players: PlayerRegistry,
        ids: Vec<PlayerId>,
        inboxes: Vec<Option<UnboundedReceiver<ServerMsg>>>,
        session: GameSession,
        _events: mpsc::Receiver<LobbyEvent>,
    }

    impl Fixture {
        fn new(n: usize) -> Self {
            Self::with_config(n, GameConfig::default())
        }

        fn with_config(n: usize, mut config: GameConfig) -> Self {
            config.players_per_match = n;
            let config = Arc::new(config);
            let (events_tx, events_rx) = mpsc::channel(1024);
            let mut players = PlayerRegistry::new();
            let mut ids = Vec::new();
            let mut inboxes = Vec::new();
            for _ in 0..n {
                let (conn, rx) = PlayerConnection::new();
                ids.push(players.connect(conn));
                inboxes.push(Some(rx));
            }
            for (seat, id) in ids.iter().enumerate() {
                players
                    .get_mut(id)
                    .unwrap()
                    .bind(1, seat, PhysicsSystem::spawn_position(seat, n));
            }
            let session = GameSession::new(
                1,
                ids.clone(),
                Minigame::SumoRing,
                1234,
                config,
                events_tx,
            );
            Self {
                players,
                ids,
                inboxes,
                session,
                _events: events_rx,
            }
        }

        fn drain(&mut self, i: usize) -> Vec<ServerMsg> {
            let mut out = Vec::new();
            if let Some(rx) = self.inboxes[i].as_mut() {
                while let Ok(msg) = rx.try_recv() {
                    out.push(msg);
                }
            }
            out
        }

        fn close(&mut self, i: usize) {
            self.inboxes[i] = None;
        }

        fn to_playing(&mut self) {
            self.session.start(&self.players);
            while self.session.state() == SessionState::Countdown {
                self.session.tick(&mut self.players);
            }
        }
    }

    fn count_game_end(msgs: &[ServerMsg]) -> usize {
        msgs.iter()
            .filter(|m| matches!(m, ServerMsg::GameEnd { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_start_broadcasts_and_arms_timers() {
        let mut fx = Fixture::new(2);
        assert!(fx.session.start(&fx.players));
        assert_eq!(fx.session.state(), SessionState::Countdown);
        assert!(fx.session.timers().is_ticking());

        let msgs = fx.drain(0);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMsg::GameStart { game_id: 1, seed: 1234, players, .. }] if players.len() == 2
        ));

        // Second start is a no-op
        assert!(!fx.session.start(&fx.players));
        assert!(fx.drain(0).is_empty());
    }

    #[tokio::test]
    async fn test_countdown_takes_exactly_sixty_ticks() {
        let mut fx = Fixture::new(2);
        fx.session.start(&fx.players);

        for _ in 0..59 {
            fx.session.tick(&mut fx.players);
        }
        assert_eq!(fx.session.state(), SessionState::Countdown);

        fx.session.tick(&mut fx.players);
        assert_eq!(fx.session.state(), SessionState::Playing);
        assert_eq!(fx.session.tick_count(), 60);
        assert_eq!(fx.session.round_remaining(), 1200);
    }

    #[tokio::test]
    async fn test_uneven_tick_rate_keeps_exact_tick_counts() {
        let config = GameConfig {
            tick_rate: 30,
            round_duration: Duration::from_secs(2),
            ..GameConfig::default()
        };
        let mut fx = Fixture::with_config(2, config);
        fx.session.start(&fx.players);

        let mut countdown_ticks = 0;
        while fx.session.state() == SessionState::Countdown {
            fx.session.tick(&mut fx.players);
            countdown_ticks += 1;
        }
        assert_eq!(countdown_ticks, 90);
        assert_eq!(fx.session.round_remaining(), 60);

        let mut round_ticks = 0;
        while fx.session.state() == SessionState::Playing {
            fx.session.tick(&mut fx.players);
            round_ticks += 1;
        }
        assert_eq!(round_ticks, 60);
        assert!(matches!(
            fx.drain(0).last(),
            Some(ServerMsg::GameEnd { reason: EndReason::Normal, .. })
        ));
    }

    #[tokio::test]
    async fn test_state_timer_reports_seconds_left() {
        let mut fx = Fixture::new(2);
        fx.session.start(&fx.players);
        fx.drain(0);

        for _ in 0..10 {
            fx.session.tick(&mut fx.players);
        }
        match fx.drain(0).last() {
            Some(ServerMsg::GameState { tick: 10, timer, .. }) => {
                assert!((timer - 2.5).abs() < 1e-6);
            }
            other => panic!("expected game_state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tick_broadcasts_state_in_order() {
        let mut fx = Fixture::new(2);
        fx.session.start(&fx.players);
        fx.drain(0);

        fx.session.tick(&mut fx.players);
        fx.session.tick(&mut fx.players);
        let ticks: Vec<u64> = fx
            .drain(1)
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::GameState { tick, state, players, .. } => {
                    assert_eq!(state, SessionState::Countdown);
                    assert_eq!(players.len(), 2);
                    Some(tick)
                }
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_waiting_session_does_not_tick() {
        let mut fx = Fixture::new(2);
        fx.session.tick(&mut fx.players);
        assert_eq!(fx.session.tick_count(), 0);
        assert!(fx.drain(0).is_empty());
    }

    #[tokio::test]
    async fn test_input_only_accepted_while_playing() {
        let mut fx = Fixture::new(2);
        let id = fx.ids[0];
        let input = InputVector {
            x: 1.0,
            ..Default::default()
        };

        assert!(!fx.session.handle_input(&mut fx.players, &id, input));
        fx.to_playing();
        assert!(fx.session.handle_input(&mut fx.players, &id, input));
        assert_eq!(fx.players.get(&id).unwrap().input, input);

        fx.players.get_mut(&id).unwrap().alive = false;
        assert!(!fx.session.handle_input(&mut fx.players, &id, InputVector::default()));
        assert_eq!(fx.players.get(&id).unwrap().input, input);
    }

    #[tokio::test]
    async fn test_playing_tick_moves_players() {
        let mut fx = Fixture::new(2);
        fx.to_playing();
        let id = fx.ids[0];
        let start = fx.players.get(&id).unwrap().position;
        fx.session.handle_input(
            &mut fx.players,
            &id,
            InputVector {
                z: 1.0,
                ..Default::default()
            },
        );
        fx.session.tick(&mut fx.players);
        let player = fx.players.get(&id).unwrap();
        assert!(player.velocity.z > 0.0);
        assert!(player.position.z > start.z);
    }

    #[tokio::test]
    async fn test_last_alive_ends_normally_without_state_broadcast() {
        let mut fx = Fixture::new(3);
        fx.to_playing();
        fx.drain(0);

        fx.players.get_mut(&fx.ids[1]).unwrap().alive = false;
        fx.players.get_mut(&fx.ids[2]).unwrap().alive = false;
        fx.session.tick(&mut fx.players);

        assert_eq!(fx.session.state(), SessionState::Ended);
        let msgs = fx.drain(0);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMsg::GameEnd { reason: EndReason::Normal, placements }]
                if placements.len() == 3 && placements[0].player_id == fx.ids[0]
        ));
        assert!(fx.session.timers().is_idle());
        for id in &fx.ids {
            let p = fx.players.get(id).unwrap();
            assert!(p.game_id.is_none());
            assert!(p.seat.is_none());
        }
    }

    #[tokio::test]
    async fn test_round_timer_expiry_ends_session() {
        let config = GameConfig {
            countdown: Duration::ZERO,
            round_duration: Duration::from_secs(1),
            ..GameConfig::default()
        };
        let mut fx = Fixture::with_config(2, config);
        fx.session.start(&fx.players);
        // Zero countdown: first tick enters playing
        fx.session.tick(&mut fx.players);
        assert_eq!(fx.session.state(), SessionState::Playing);

        for _ in 0..19 {
            fx.session.tick(&mut fx.players);
        }
        assert_eq!(fx.session.state(), SessionState::Playing);
        fx.session.tick(&mut fx.players);
        assert_eq!(fx.session.state(), SessionState::Ended);
        assert!(matches!(
            fx.drain(0).last(),
            Some(ServerMsg::GameEnd { reason: EndReason::Normal, .. })
        ));
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let mut fx = Fixture::new(2);
        fx.session.start(&fx.players);

        assert!(fx.session.end(&mut fx.players, EndReason::Timeout));
        assert!(!fx.session.end(&mut fx.players, EndReason::Normal));
        fx.session.tick(&mut fx.players);

        let msgs = fx.drain(0);
        assert_eq!(count_game_end(&msgs), 1);
        assert!(matches!(
            msgs.last(),
            Some(ServerMsg::GameEnd { reason: EndReason::Timeout, .. })
        ));
        assert!(!fx.session.start(&fx.players));
    }

    #[tokio::test]
    async fn test_disconnects_end_session_when_one_remains() {
        let mut fx = Fixture::new(3);
        fx.to_playing();

        fx.close(0);
        let id = fx.ids[0];
        assert!(fx.session.remove_player(&mut fx.players, &id));
        assert_eq!(fx.session.state(), SessionState::Playing);
        assert!(fx.players.get(&fx.ids[0]).unwrap().game_id.is_none());

        let msgs = fx.drain(1);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMsg::PlayerLeft { player_index: 0, .. }
        )));

        fx.close(1);
        let id = fx.ids[1];
        fx.session.remove_player(&mut fx.players, &id);
        assert_eq!(fx.session.state(), SessionState::Ended);

        let msgs = fx.drain(2);
        match msgs.last() {
            Some(ServerMsg::GameEnd {
                reason: EndReason::Disconnect,
                placements,
            }) => {
                // Only the still-connected player is ranked
                assert_eq!(placements.len(), 1);
                assert_eq!(placements[0].player_id, fx.ids[2]);
                assert_eq!(placements[0].placement, 1);
            }
            other => panic!("expected game_end, got {:?}", other),
        }
        assert!(fx.players.get(&fx.ids[2]).unwrap().game_id.is_none());
    }

    #[tokio::test]
    async fn test_remove_in_waiting_state_ends_two_player_session() {
        let mut fx = Fixture::new(2);
        fx.close(0);
        let id = fx.ids[0];
        fx.session.remove_player(&mut fx.players, &id);
        assert_eq!(fx.session.state(), SessionState::Ended);
        assert_eq!(count_game_end(&fx.drain(1)), 1);
    }

    #[tokio::test]
    async fn test_start_if_all_ready() {
        let mut fx = Fixture::new(2);
        fx.players.get_mut(&fx.ids[0]).unwrap().ready = true;
        assert!(!fx.session.start_if_all_ready(&fx.players));
        assert_eq!(fx.session.state(), SessionState::Waiting);

        fx.players.get_mut(&fx.ids[1]).unwrap().ready = true;
        assert!(fx.session.start_if_all_ready(&fx.players));
        assert_eq!(fx.session.state(), SessionState::Countdown);
    }
}
