//! Lobby actor: a single task that owns the [`Lobby`] and processes events in order

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::GameConfig;
use crate::game::{GameId, SessionEvent};
use crate::ws::protocol::ClientMsg;

use super::players::{PlayerConnection, PlayerId};
use super::state::{Lobby, LobbyStatus};

/// Capacity of the lobby inbox
const EVENT_QUEUE_SIZE: usize = 1024;

/// Everything the lobby reacts to
#[derive(Debug)]
pub enum LobbyEvent {
    /// New connection; replies with the generated player id
    Connected {
        connection: PlayerConnection,
        reply: oneshot::Sender<PlayerId>,
    },
    /// Parsed inbound message
    Message { player_id: PlayerId, msg: ClientMsg },
    /// Connection closed
    Disconnected { player_id: PlayerId },
    /// Session timer fired
    Session { game_id: GameId, event: SessionEvent },
    /// Status probe
    Status { reply: oneshot::Sender<LobbyStatus> },
}

/// Errors talking to the lobby
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby is not running")]
    Closed,
}

/// Cloneable sender side of the lobby
#[derive(Clone)]
pub struct LobbyHandle {
    tx: mpsc::Sender<LobbyEvent>,
}

impl LobbyHandle {
    /// Register a connection and get its player id
    pub async fn connect(&self, connection: PlayerConnection) -> Result<PlayerId, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyEvent::Connected { connection, reply }).await?;
        rx.await.map_err(|_| LobbyError::Closed)
    }

    pub async fn message(&self, player_id: PlayerId, msg: ClientMsg) -> Result<(), LobbyError> {
        self.send(LobbyEvent::Message { player_id, msg }).await
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        self.send(LobbyEvent::Disconnected { player_id }).await
    }

    /// Snapshot of queue depth, live sessions and connections
    pub async fn status(&self) -> Result<LobbyStatus, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.send(LobbyEvent::Status { reply }).await?;
        rx.await.map_err(|_| LobbyError::Closed)
    }

    async fn send(&self, event: LobbyEvent) -> Result<(), LobbyError> {
        self.tx.send(event).await.map_err(|_| LobbyError::Closed)
    }
}

/// The task side of the lobby
pub struct LobbyActor {
    lobby: Lobby,
    rx: mpsc::Receiver<LobbyEvent>,
}

impl LobbyActor {
    /// Create the actor and its handle
    pub fn new(config: Arc<GameConfig>) -> (Self, LobbyHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let lobby = Lobby::new(config, tx.clone());
        (Self { lobby, rx }, LobbyHandle { tx })
    }

    /// Process events until every handle is dropped
    pub async fn run(mut self) {
        info!("Lobby actor started");
        // The lobby keeps a sender for its timers, so `recv` only returns
        // None if that sender is gone too; handles going away is not enough.
        while let Some(event) = self.rx.recv().await {
            self.lobby.handle_event(event);
        }
        info!("Lobby actor stopped");
    }
}
