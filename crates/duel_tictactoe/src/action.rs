//! Move log entries.
//!
//! Accepted moves are recorded as domain events, in order, and never edited.

use crate::types::{Mark, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Who moved.
    pub player_id: PlayerId,
    /// Mark placed.
    pub symbol: Mark,
    /// Board index (0-8).
    pub cell_index: usize,
    /// When the move was accepted.
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) -> {}", self.player_id, self.symbol, self.cell_index)
    }
}
