//! FIFO matchmaking queue.
//!
//! Membership is unique per player id. The two longest-waiting players are
//! always paired first.

use crate::outbox::ConnectionId;
use chrono::{DateTime, Utc};
use duel_tictactoe::{PlayerId, PlayerRef};
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// A player waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingEntry {
    /// Who is waiting.
    pub player: PlayerRef,
    /// Connection the player joined from.
    pub connection: ConnectionId,
    /// When the player (re-)joined.
    pub joined_at: DateTime<Utc>,
}

impl WaitingEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(player: PlayerRef, connection: ConnectionId) -> Self {
        Self {
            player,
            connection,
            joined_at: Utc::now(),
        }
    }
}

/// Ordered collection of waiting players.
#[derive(Debug, Clone, Default)]
pub struct MatchmakingQueue {
    entries: VecDeque<WaitingEntry>,
}

impl MatchmakingQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` at the tail, replacing any earlier entry for the same player.
    #[instrument(skip(self, entry), fields(player_id = %entry.player.id))]
    pub fn enqueue(&mut self, entry: WaitingEntry) {
        if self.remove(&entry.player.id).is_some() {
            debug!("Replacing existing queue entry");
        }
        self.entries.push_back(entry);
        debug!(waiting = self.entries.len(), "Queue entry appended");
    }

    /// Removes the entry for `player_id`, if present.
    pub fn remove(&mut self, player_id: &str) -> Option<WaitingEntry> {
        let index = self.entries.iter().position(|e| e.player.id == player_id)?;
        self.entries.remove(index)
    }

    /// Pops the two head entries when at least two players wait.
    ///
    /// The first element is the longer-waiting player and takes the first seat.
    #[instrument(skip(self))]
    pub fn try_pair(&mut self) -> Option<(WaitingEntry, WaitingEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        debug!(first = %first.player.id, second = %second.player.id, "Paired players");
        Some((first, second))
    }

    /// Puts a pair back at the head in its original order.
    pub fn restore(&mut self, first: WaitingEntry, second: WaitingEntry) {
        self.entries.push_front(second);
        self.entries.push_front(first);
    }

    /// Checks whether `player_id` is waiting.
    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.iter().any(|e| e.player.id == player_id)
    }

    /// Waiting player ids, head first.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.entries.iter().map(|e| e.player.id.clone()).collect()
    }

    /// Number of waiting players.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
