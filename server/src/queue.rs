//! Matchmaking queue: sessions waiting for enough peers to form a lobby.

use crate::session::{ConnectionId, PlayerSession};
use crate::stable_list::{StableList, Step};
use log::{debug, info};

pub struct MatchmakingQueue {
    waiting: StableList<PlayerSession>,
    lobby_size: usize,
}

impl MatchmakingQueue {
    pub fn new(lobby_size: usize) -> Self {
        Self {
            waiting: StableList::new(),
            lobby_size,
        }
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn enqueue(&mut self, session: PlayerSession) {
        info!(
            "Queued {} ({} waiting)",
            session.identity(),
            self.waiting.len() + 1
        );
        self.waiting.push_back(session);
    }

    /// Scans from the front, pruning invalid sessions in place. Once
    /// `lobby_size` valid sessions have been seen, they are popped in arrival
    /// order and returned; otherwise the queue keeps its order and `None` is
    /// returned.
    pub fn promote(&mut self) -> Option<Vec<PlayerSession>> {
        let mut valid = 0;
        let mut pruned = 0;
        let mut cursor = self.waiting.cursor_front_mut();
        while !cursor.at_back() {
            let is_valid = cursor.value().is_some_and(PlayerSession::is_valid);
            if is_valid {
                valid += 1;
                if valid == self.lobby_size {
                    break;
                }
                cursor.advance();
            } else {
                if let Some(session) = cursor.remove(Step::Forward) {
                    debug!("Pruned {} from the queue", session.identity());
                }
                pruned += 1;
            }
        }

        if pruned > 0 {
            debug!("Queue scan pruned {} dead sessions", pruned);
        }
        if valid < self.lobby_size {
            return None;
        }

        // Every invalid session ahead of the last counted one is gone, so the
        // front of the queue is exactly the sessions that were counted.
        let group: Vec<PlayerSession> = (0..self.lobby_size)
            .filter_map(|_| self.waiting.pop_front())
            .collect();
        Some(group)
    }

    pub fn find_mut(&mut self, connection_id: ConnectionId) -> Option<&mut PlayerSession> {
        let mut cursor = self.waiting.cursor_front_mut();
        while !cursor.at_back() {
            if cursor.value().map(PlayerSession::connection_id) == Some(connection_id) {
                break;
            }
            cursor.advance();
        }
        let handle = cursor.handle()?;
        self.waiting.get_mut(handle)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.waiting.iter().map(PlayerSession::identity)
    }
}
