//! Errors raised by the match state machine.

use crate::types::{Phase, PlayerId};

/// Why a move was refused. The match is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The match is not accepting moves.
    #[display("Match is not active (phase: {_0})")]
    NotActive(Phase),

    /// The mover does not hold the turn, or is not seated in this match.
    #[display("Not your turn")]
    NotYourTurn,

    /// Cell index outside 0-8.
    #[display("Cell index must be between 0 and 8")]
    OutOfRange,

    /// Cell already claimed.
    #[display("Cell {_0} is already taken")]
    CellOccupied(usize),
}

impl MoveError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            MoveError::NotActive(_) => "not_active",
            MoveError::NotYourTurn => "not_your_turn",
            MoveError::OutOfRange => "out_of_range",
            MoveError::CellOccupied(_) => "cell_occupied",
        }
    }
}

impl std::error::Error for MoveError {}

/// Errors from creating or starting a match.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MatchError {
    /// Both seats were given the same player id.
    #[display("Player {_0} cannot occupy both seats")]
    DuplicatePlayer(PlayerId),

    /// `start` called outside the pending phase.
    #[display("Match cannot start from phase {_0}")]
    NotPending(Phase),
}

impl std::error::Error for MatchError {}
