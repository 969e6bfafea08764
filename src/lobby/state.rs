//! Lobby: the single owner of players, the queue and live sessions

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::game::minigame::Minigame;
use crate::game::physics::PhysicsSystem;
use crate::game::{EndReason, GameId, GameSession, SessionEvent, SessionRegistry, SessionState};
use crate::matchmaking::MatchmakingQueue;
use crate::ws::protocol::{ClientMsg, InputVector, ServerMsg};

use super::actor::LobbyEvent;
use super::players::{PlayerConnection, PlayerId, PlayerRegistry};

/// Read-only snapshot for the status probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyStatus {
    pub queue_size: usize,
    pub active_sessions: usize,
    pub connected_players: usize,
}

/// All mutable server state. Only ever touched by the lobby actor task.
pub struct Lobby {
    config: Arc<GameConfig>,
    players: PlayerRegistry,
    queue: MatchmakingQueue,
    sessions: SessionRegistry,
    rng: ChaCha8Rng,
    events: mpsc::Sender<LobbyEvent>,
}

impl Lobby {
    /// `events` is the actor's own inbox; session timers post back into it
    pub fn new(config: Arc<GameConfig>, events: mpsc::Sender<LobbyEvent>) -> Self {
        let rng = match config.match_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            queue: MatchmakingQueue::new(config.players_per_match),
            players: PlayerRegistry::new(),
            sessions: SessionRegistry::new(),
            rng,
            events,
            config,
        }
    }

    #[cfg(test)]
    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    #[cfg(test)]
    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn status(&self) -> LobbyStatus {
        LobbyStatus {
            queue_size: self.queue.len(),
            active_sessions: self.sessions.active_sessions(),
            connected_players: self.players.len(),
        }
    }

    /// Process one actor event
    pub fn handle_event(&mut self, event: LobbyEvent) {
        match event {
            LobbyEvent::Connected { connection, reply } => {
                let player_id = self.connect(connection);
                if reply.send(player_id).is_err() {
                    // Socket task went away before it learned its id
                    self.players.remove(&player_id);
                    debug!(player_id = %player_id, "Connect reply dropped, player discarded");
                }
            }
            LobbyEvent::Message { player_id, msg } => self.handle_message(player_id, msg),
            LobbyEvent::Disconnected { player_id } => self.disconnect(player_id),
            LobbyEvent::Session { game_id, event } => self.handle_session_event(game_id, event),
            LobbyEvent::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    // ------------------------------------------------------------------
    // Connection lifecycle and dispatch
    // ------------------------------------------------------------------

    pub fn connect(&mut self, connection: PlayerConnection) -> PlayerId {
        let player_id = self.players.connect(connection);
        info!(player_id = %player_id, connected = self.players.len(), "Player connected");
        player_id
    }

    /// Route an inbound message by kind
    pub fn handle_message(&mut self, player_id: PlayerId, msg: ClientMsg) {
        if self.players.get(&player_id).is_none() {
            debug!(player_id = %player_id, "Message from unknown player");
            return;
        }

        match msg {
            ClientMsg::JoinQueue { username } => self.join_queue(player_id, username),
            ClientMsg::LeaveQueue => self.leave_queue(player_id),
            ClientMsg::PlayerInput { x, z, jump, action } => {
                let input = InputVector::sanitize(&x, &z, &jump, &action);
                self.player_input(player_id, input);
            }
            ClientMsg::Ready => self.ready(player_id),
            ClientMsg::Unknown => {
                debug!(player_id = %player_id, "Ignoring unknown message kind");
            }
        }
    }

    pub fn disconnect(&mut self, player_id: PlayerId) {
        self.leave_queue(player_id);

        let game_id = self.players.get(&player_id).and_then(|p| p.game_id);
        if let Some(game_id) = game_id {
            if let Some(session) = self.sessions.get_mut(game_id) {
                session.remove_player(&mut self.players, &player_id);
            }
            self.reap(game_id);
        }

        if self.players.remove(&player_id).is_some() {
            info!(player_id = %player_id, connected = self.players.len(), "Player disconnected");
        }
    }

    fn player_input(&mut self, player_id: PlayerId, input: InputVector) {
        let game_id = self.players.get(&player_id).and_then(|p| p.game_id);
        if let Some(session) = game_id.and_then(|id| self.sessions.get(id)) {
            session.handle_input(&mut self.players, &player_id, input);
        }
    }

    fn ready(&mut self, player_id: PlayerId) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.ready = true;

        if let Some(game_id) = player.game_id {
            if let Some(session) = self.sessions.get_mut(game_id) {
                if session.start_if_all_ready(&self.players) {
                    info!(game_id, "All players ready, starting early");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Matchmaking
    // ------------------------------------------------------------------

    /// Queue a player. No-op if already queued or seated in a session.
    pub fn join_queue(&mut self, player_id: PlayerId, username: Option<String>) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        if player.game_id.is_some() || self.queue.contains(&player_id) {
            debug!(player_id = %player_id, "Join ignored, already queued or in a session");
            return;
        }

        if let Some(name) = username.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            player.username = name.to_string();
        }

        self.queue.enqueue(player_id);
        info!(player_id = %player_id, queue_size = self.queue.len(), "Player joined matchmaking queue");

        self.broadcast_queue_status();
        self.try_form_match();
    }

    /// Remove a player from the queue if present
    pub fn leave_queue(&mut self, player_id: PlayerId) {
        if self.queue.dequeue(&player_id) {
            info!(player_id = %player_id, queue_size = self.queue.len(), "Player left matchmaking queue");
            self.broadcast_queue_status();
        }
    }

    /// Form as many sessions as the queue allows
    pub fn try_form_match(&mut self) {
        let mut formed = false;
        while let Some(player_ids) = self.queue.try_form_match() {
            self.create_session(player_ids);
            formed = true;
        }
        if formed {
            self.broadcast_queue_status();
        }
    }

    fn create_session(&mut self, player_ids: Vec<PlayerId>) {
        let game_id = self.sessions.next_id();
        let minigame = Minigame::random(&mut self.rng);
        let seed: u32 = self.rng.gen();
        let seats = player_ids.len();

        for (seat, id) in player_ids.iter().enumerate() {
            if let Some(player) = self.players.get_mut(id) {
                player.bind(game_id, seat, PhysicsSystem::spawn_position(seat, seats));
            }
        }

        let mut session = GameSession::new(
            game_id,
            player_ids,
            minigame,
            seed,
            self.config.clone(),
            self.events.clone(),
        );
        session.announce(&self.players);
        self.sessions.insert(session);

        info!(game_id, minigame = ?minigame, players = seats, "Created new session");
    }

    fn broadcast_queue_status(&self) {
        let players_in_queue = self.queue.len();
        let players_needed = self.queue.players_needed();
        for (i, id) in self.queue.iter().enumerate() {
            self.players.send(
                id,
                ServerMsg::QueueStatus {
                    position: i + 1,
                    players_in_queue,
                    players_needed,
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    fn handle_session_event(&mut self, game_id: GameId, event: SessionEvent) {
        if !self.sessions.contains(game_id) {
            debug!(game_id, ?event, "Timer fired for a session that is gone");
            return;
        }

        match event {
            SessionEvent::AutoStart => {
                self.start_session(game_id);
            }
            SessionEvent::Tick => self.tick_session(game_id),
            SessionEvent::Timeout => {
                self.end_session(game_id, EndReason::Timeout);
            }
        }
    }

    /// Run one tick of a session, deregistering it if the tick ended it
    pub fn tick_session(&mut self, game_id: GameId) {
        if let Some(session) = self.sessions.get_mut(game_id) {
            session.tick(&mut self.players);
        }
        self.reap(game_id);
    }

    /// Start a waiting session now
    pub fn start_session(&mut self, game_id: GameId) -> bool {
        self.sessions
            .get_mut(game_id)
            .map_or(false, |s| s.start(&self.players))
    }

    /// End a session and deregister it. Returns false if it was already gone.
    pub fn end_session(&mut self, game_id: GameId, reason: EndReason) -> bool {
        let ended = self
            .sessions
            .get_mut(game_id)
            .map_or(false, |s| s.end(&mut self.players, reason));
        self.reap(game_id);
        ended
    }

    /// Drop a session from the registry once it has ended
    fn reap(&mut self, game_id: GameId) {
        let ended = self
            .sessions
            .get(game_id)
            .map_or(false, |s| s.state() == SessionState::Ended);
        if ended {
            self.sessions.remove(game_id);
            info!(game_id, active_sessions = self.sessions.active_sessions(), "Session removed from registry");
        }
    }
}
