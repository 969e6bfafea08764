//! Game session modules

pub mod minigame;
pub mod physics;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod timers;

pub use registry::SessionRegistry;
pub use session::GameSession;
pub use timers::SessionEvent;

use serde::{Deserialize, Serialize};

/// Session id, allocated from a monotonic counter
pub type GameId = u64;

/// Session phase. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Formed, waiting for auto-start or all players ready
    Waiting,
    /// Countdown before play
    Countdown,
    /// Simulation running
    Playing,
    /// Terminal
    Ended,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// One or fewer players alive, or round timer expired
    Normal,
    /// Too few connected players remained
    Disconnect,
    /// Absolute session timeout
    Timeout,
}
