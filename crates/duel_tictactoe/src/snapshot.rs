//! Serializable point-in-time views of a match.

use crate::action::MoveRecord;
use crate::outcome::Outcome;
use crate::types::{CELL_COUNT, Mark, MatchId, Phase, PlayerId, Seat};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A seat as rendered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Mark owned by the seat.
    pub symbol: Mark,
}

impl From<&Seat> for SeatView {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.player.id.clone(),
            name: seat.player.name.clone(),
            symbol: seat.mark,
        }
    }
}

/// Full match state sent to both participants after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    /// Match id.
    pub id: MatchId,
    /// Cells in row-major order; `None` is empty.
    pub board: [Option<Mark>; CELL_COUNT],
    /// Seat holding the turn (the last mover once concluded).
    pub current_player: SeatView,
    /// First seat (X).
    pub slot_a: SeatView,
    /// Second seat (O).
    pub slot_b: SeatView,
    /// Lifecycle stage.
    pub phase: Phase,
    /// Set once the match concludes.
    pub outcome: Option<Outcome>,
    /// Indices of the completed line, for a win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_line: Option<[usize; 3]>,
    /// Accepted moves, oldest first.
    pub move_log: Vec<MoveRecord>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
