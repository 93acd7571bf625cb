//! Core domain types for a tic-tac-toe match.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, caller-supplied player identifier.
pub type PlayerId = String;

/// Number of cells on the board.
pub const CELL_COUNT: usize = 9;

/// Unique identifier of a match, generated at creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct MatchId(Uuid);

impl MatchId {
    /// Generates a fresh random match id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MatchId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Symbol owned by a seat. `X` always belongs to the first seat and moves first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
pub enum Mark {
    /// First seat.
    X,
    /// Second seat.
    O,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Cell {
    /// Nobody has played here.
    #[default]
    Empty,
    /// Claimed by a mark; never reverts to empty.
    Occupied(Mark),
}

impl Cell {
    /// Returns the mark in this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(mark) => Some(mark),
        }
    }
}

/// 3x3 board stored in row-major order (indices 0-8).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cell at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Checks whether the cell at `index` exists and is empty.
    pub fn is_empty(&self, index: usize) -> bool {
        matches!(self.get(index), Some(Cell::Empty))
    }

    /// Returns all cells.
    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    /// Claims an empty cell. Occupied or out-of-range cells are left untouched.
    pub(crate) fn claim(&mut self, index: usize, mark: Mark) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) if *cell == Cell::Empty => {
                *cell = Cell::Occupied(mark);
                true
            }
            _ => false,
        }
    }

    /// Builds a board from raw cells. Test helper for rule checks.
    #[cfg(test)]
    pub(crate) fn from_cells(cells: [Cell; CELL_COUNT]) -> Self {
        Self { cells }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..3 {
            for col in 0..3 {
                let index = row * 3 + col;
                match self.cells[index] {
                    Cell::Empty => write!(f, "{}", index + 1)?,
                    Cell::Occupied(mark) => write!(f, "{mark}")?,
                }
                if col < 2 {
                    write!(f, "|")?;
                }
            }
            if row < 2 {
                write!(f, "\n-+-+-\n")?;
            }
        }
        Ok(())
    }
}

/// A player as seen by a match: stable id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Caller-supplied identifier.
    pub id: PlayerId,
    /// Name shown to the opponent.
    pub name: String,
}

impl PlayerRef {
    /// Creates a player reference.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One half of a match: a player bound to a fixed mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Occupant.
    pub player: PlayerRef,
    /// Mark used by the occupant for the whole match.
    pub mark: Mark,
}

/// Lifecycle stage of a match. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Created, not started.
    Pending,
    /// Accepting moves.
    Active,
    /// Terminal, read-only.
    Concluded,
}
