//! Matchmaking queue implementation

use std::collections::VecDeque;

use crate::lobby::PlayerId;

/// FIFO of players waiting for a match, without duplicates
pub struct MatchmakingQueue {
    queue: VecDeque<PlayerId>,
    /// Players per match
    match_size: usize,
}

impl MatchmakingQueue {
    pub fn new(match_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            match_size,
        }
    }

    /// Append a player to the tail. Returns false if already queued.
    pub fn enqueue(&mut self, player_id: PlayerId) -> bool {
        if self.contains(&player_id) {
            return false;
        }
        self.queue.push_back(player_id);
        true
    }

    /// Remove a player from the queue. Returns false if not queued.
    pub fn dequeue(&mut self, player_id: &PlayerId) -> bool {
        if let Some(pos) = self.position(player_id) {
            self.queue.remove(pos);
            true
        } else {
            false
        }
    }

    /// Check if a player is in the queue
    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.queue.contains(player_id)
    }

    /// 0-based position of a player
    pub fn position(&self, player_id: &PlayerId) -> Option<usize> {
        self.queue.iter().position(|p| p == player_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Players still missing for the next match
    pub fn players_needed(&self) -> usize {
        self.match_size.saturating_sub(self.queue.len())
    }

    /// Queued players front to back
    pub fn iter(&self) -> impl Iterator<Item = &PlayerId> {
        self.queue.iter()
    }

    /// Take the first `match_size` players in FIFO order, or None if not enough
    pub fn try_form_match(&mut self) -> Option<Vec<PlayerId>> {
        if self.queue.len() < self.match_size {
            return None;
        }
        Some(self.queue.drain(..self.match_size).collect())
    }
}
