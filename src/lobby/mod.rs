//! Lobby: player registry, dispatch and the actor that owns them

pub mod actor;
pub mod players;
pub mod state;

pub use actor::{LobbyActor, LobbyEvent, LobbyHandle};
pub use players::{Player, PlayerConnection, PlayerId, PlayerRegistry};
pub use state::LobbyStatus;
