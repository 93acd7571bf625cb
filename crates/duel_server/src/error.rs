//! Error types for intent handling and the session directory.

use derive_more::{Display, Error};
use duel_tictactoe::{MatchId, MoveError, PlayerId};

/// Why an inbound intent was refused.
///
/// Each variant maps to one reply on the requester's connection; none of them
/// changes coordinator state.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum IntentError {
    /// Malformed or incomplete intent.
    #[display("{_0}")]
    Validation(String),

    /// The player is not placed in any match.
    #[display("Match not found")]
    NoMatch,

    /// The match refused the move.
    #[display("{_0}")]
    Rejected(MoveError),

    /// Coordinator invariant broken. Indicates a defect.
    #[display("Internal error: {_0}")]
    Internal(String),
}

impl IntentError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl std::error::Error for IntentError {}

impl From<MoveError> for IntentError {
    fn from(err: MoveError) -> Self {
        Self::Rejected(err)
    }
}

impl From<DirectoryError> for IntentError {
    fn from(err: DirectoryError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Session directory invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DirectoryError {
    /// The player is already placed in another live match.
    #[display("Player {player_id} is already in match {current}")]
    AlreadyPlaced {
        /// Player being placed.
        player_id: PlayerId,
        /// Match the player already occupies.
        current: MatchId,
    },

    /// The target match is not in the directory.
    #[display("Match {match_id} does not exist")]
    UnknownMatch {
        /// Missing match.
        match_id: MatchId,
    },
}
