//! Registry of live game sessions

use std::collections::HashMap;

use super::session::GameSession;
use super::GameId;

/// All sessions that have not yet ended, plus the id counter
pub struct SessionRegistry {
    sessions: HashMap<GameId, GameSession>,
    next_id: GameId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate the next monotonic session id
    pub fn next_id(&mut self) -> GameId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, session: GameSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: GameId) -> Option<&GameSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: GameId) -> Option<&mut GameSession> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: GameId) -> Option<GameSession> {
        self.sessions.remove(&id)
    }

    pub fn contains(&self, id: GameId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
