//! Minigame catalog

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minigame variant played by a session. Purely descriptive to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Minigame {
    SumoRing,
    KingOfTheHill,
    HotPotato,
    FloorIsLava,
    TagRush,
}

/// Broad category a variant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinigameType {
    Arena,
    Elimination,
    Survival,
    Chase,
}

impl Minigame {
    /// Full catalog
    pub const ALL: [Minigame; 5] = [
        Minigame::SumoRing,
        Minigame::KingOfTheHill,
        Minigame::HotPotato,
        Minigame::FloorIsLava,
        Minigame::TagRush,
    ];

    pub fn kind(self) -> MinigameType {
        match self {
            Minigame::SumoRing | Minigame::KingOfTheHill => MinigameType::Arena,
            Minigame::HotPotato => MinigameType::Elimination,
            Minigame::FloorIsLava => MinigameType::Survival,
            Minigame::TagRush => MinigameType::Chase,
        }
    }

    /// Uniform draw from the catalog
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&Minigame::SumoRing)
    }
}
