//! Session directory: who is connected where, and who plays in which match.
//!
//! The directory is the single source of cross-reference truth. Matches live
//! in an arena keyed by [`MatchId`]; players refer to them by id only, so
//! removing a match can never leave a dangling reference behind.

use crate::error::DirectoryError;
use crate::outbox::ConnectionId;
use chrono::{DateTime, Utc};
use duel_tictactoe::{Match, MatchId, PlayerId};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// What [`SessionDirectory::vacate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vacancy {
    /// The player was not placed in any match.
    NotPlaced,
    /// The player left; the opponent is still placed in the match.
    Left(MatchId),
    /// The player was the last occupant; the match was discarded.
    Discarded(MatchId),
}

/// Player-to-connection and player-to-match mappings plus the match arena.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    connections: HashMap<PlayerId, ConnectionId>,
    players_by_connection: HashMap<ConnectionId, PlayerId>,
    placements: HashMap<PlayerId, MatchId>,
    matches: HashMap<MatchId, Match>,
}

impl SessionDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `player_id` to `connection`, replacing any earlier binding on
    /// either side.
    #[instrument(skip(self))]
    pub fn bind(&mut self, player_id: &str, connection: ConnectionId) {
        if let Some(previous) = self.connections.insert(player_id.to_string(), connection)
            && previous != connection
        {
            debug!(%previous, "Rebinding player to new connection");
            self.players_by_connection.remove(&previous);
        }
        if let Some(other) = self
            .players_by_connection
            .insert(connection, player_id.to_string())
            && other != player_id
        {
            debug!(other_player = %other, "Connection now represents a different player");
            self.connections.remove(&other);
        }
    }

    /// Drops the connection mapping for `player_id`. The match placement is
    /// left for [`vacate`](Self::vacate).
    #[instrument(skip(self))]
    pub fn unbind(&mut self, player_id: &str) -> Option<ConnectionId> {
        let connection = self.connections.remove(player_id)?;
        self.players_by_connection.remove(&connection);
        Some(connection)
    }

    /// Player currently represented by `connection`.
    pub fn player_on(&self, connection: ConnectionId) -> Option<&PlayerId> {
        self.players_by_connection.get(&connection)
    }

    /// Connection currently representing `player_id`.
    pub fn connection_of(&self, player_id: &str) -> Option<ConnectionId> {
        self.connections.get(player_id).copied()
    }

    /// Adds a match to the arena.
    #[instrument(skip_all, fields(match_id = %game.id()))]
    pub fn insert_match(&mut self, game: Match) -> MatchId {
        let id = game.id();
        self.matches.insert(id, game);
        id
    }

    /// Records that `player_id` occupies `match_id`.
    ///
    /// # Errors
    ///
    /// Fails if the match is unknown or the player is already placed in a
    /// different live match.
    #[instrument(skip(self))]
    pub fn place_in_match(&mut self, player_id: &str, match_id: MatchId) -> Result<(), DirectoryError> {
        if !self.matches.contains_key(&match_id) {
            return Err(DirectoryError::UnknownMatch { match_id });
        }
        if let Some(&current) = self.placements.get(player_id)
            && current != match_id
            && self.matches.contains_key(&current)
        {
            return Err(DirectoryError::AlreadyPlaced {
                player_id: player_id.to_string(),
                current,
            });
        }
        self.placements.insert(player_id.to_string(), match_id);
        Ok(())
    }

    /// Match id `player_id` is placed in.
    pub fn match_of(&self, player_id: &str) -> Option<MatchId> {
        self.placements.get(player_id).copied()
    }

    /// Match `player_id` is placed in.
    pub fn current_match(&self, player_id: &str) -> Option<&Match> {
        self.match_of(player_id).and_then(|id| self.matches.get(&id))
    }

    /// Looks up a match.
    pub fn get_match(&self, match_id: &MatchId) -> Option<&Match> {
        self.matches.get(match_id)
    }

    /// Looks up a match for mutation.
    pub fn get_match_mut(&mut self, match_id: &MatchId) -> Option<&mut Match> {
        self.matches.get_mut(match_id)
    }

    /// Checks whether `player_id` is still placed in `match_id`.
    pub fn is_placed_in(&self, player_id: &str, match_id: MatchId) -> bool {
        self.match_of(player_id) == Some(match_id)
    }

    /// Removes the placement of `player_id`, discarding the match when no
    /// occupant remains.
    #[instrument(skip(self))]
    pub fn vacate(&mut self, player_id: &str) -> Vacancy {
        let Some(match_id) = self.placements.remove(player_id) else {
            return Vacancy::NotPlaced;
        };

        let occupied = self.matches.get(&match_id).is_some_and(|game| {
            game.seats()
                .iter()
                .any(|seat| self.placements.get(&seat.player.id) == Some(&match_id))
        });

        if occupied {
            debug!(%match_id, "Player vacated match");
            Vacancy::Left(match_id)
        } else {
            self.matches.remove(&match_id);
            info!(%match_id, "Last player vacated, match discarded");
            Vacancy::Discarded(match_id)
        }
    }

    /// Removes a match and every placement still pointing at it.
    #[instrument(skip(self))]
    pub fn remove_match(&mut self, match_id: MatchId) -> Option<Match> {
        let game = self.matches.remove(&match_id)?;
        for seat in game.seats() {
            if self.placements.get(&seat.player.id) == Some(&match_id) {
                self.placements.remove(&seat.player.id);
            }
        }
        Some(game)
    }

    /// Ids of matches that concluded at or before `cutoff`.
    pub fn concluded_before(&self, cutoff: DateTime<Utc>) -> Vec<MatchId> {
        self.matches
            .values()
            .filter(|game| game.concluded_at().is_some_and(|at| at <= cutoff))
            .map(|game| game.id())
            .collect()
    }

    /// Number of live matches.
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Number of players placed in a match.
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of bound connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
