//! Matchmaking queue

pub mod queue;

pub use queue::MatchmakingQueue;
