//! Player registry: connection handles and per-player records

use std::collections::HashMap;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::physics::Vec3;
use crate::game::GameId;
use crate::ws::protocol::{InputVector, ServerMsg};

/// Opaque player identity, generated at connect
pub type PlayerId = Uuid;

/// Outbound half of a player's duplex channel
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    tx: mpsc::UnboundedSender<ServerMsg>,
}

impl PlayerConnection {
    /// Create a connection and the receiver its writer task drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// The connection is open while its writer still holds the receiver
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Fire-and-forget send; silently skipped when the connection is closed
    pub fn send(&self, msg: ServerMsg) {
        if self.is_open() {
            let _ = self.tx.send(msg);
        }
    }
}

/// A connected player
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub connection: PlayerConnection,
    /// Session this player is seated in
    pub game_id: Option<GameId>,
    /// Seat index within that session
    pub seat: Option<usize>,
    pub ready: bool,
    pub input: InputVector,
    pub position: Vec3,
    pub velocity: Vec3,
    pub alive: bool,
    pub score: u32,
}

impl Player {
    pub fn new(id: PlayerId, connection: PlayerConnection) -> Self {
        Self {
            id,
            username: default_username(id),
            connection,
            game_id: None,
            seat: None,
            ready: false,
            input: InputVector::default(),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            alive: false,
            score: 0,
        }
    }

    /// Seat this player in a session, resetting transient simulation state
    pub fn bind(&mut self, game_id: GameId, seat: usize, spawn: Vec3) {
        self.game_id = Some(game_id);
        self.seat = Some(seat);
        self.ready = false;
        self.input = InputVector::default();
        self.position = spawn;
        self.velocity = Vec3::ZERO;
        self.alive = true;
        self.score = 0;
    }

    /// Drop the session reference and seat
    pub fn release(&mut self) {
        self.game_id = None;
        self.seat = None;
        self.ready = false;
    }

    /// Connected and still in play
    pub fn is_active(&self) -> bool {
        self.alive && self.connection.is_open()
    }
}

fn default_username(id: PlayerId) -> String {
    format!("Player_{}", &id.simple().to_string()[..8])
}

/// All connected players by id
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection under a freshly generated id
    pub fn connect(&mut self, connection: PlayerConnection) -> PlayerId {
        let id = Uuid::new_v4();
        self.players.insert(id, Player::new(id, connection));
        id
    }

    pub fn remove(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Send to one player if known and connected
    pub fn send(&self, id: &PlayerId, msg: ServerMsg) {
        if let Some(player) = self.players.get(id) {
            player.connection.send(msg);
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}
