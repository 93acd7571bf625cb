//! Terminal results of a match, globally and per player.

use crate::types::Mark;
use serde::{Deserialize, Serialize};

/// Outcome of a concluded match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The seat holding this mark completed a line.
    Winner(Mark),
    /// Board filled without a line.
    Draw,
}

impl Outcome {
    /// Returns the winning mark if there is one.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Winner(mark) => Some(*mark),
            Outcome::Draw => None,
        }
    }

    /// Returns true if the match was a draw.
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }

    /// Interprets the outcome from the point of view of `mark`.
    pub fn for_mark(&self, mark: Mark) -> ResultKind {
        match self.winner() {
            None => ResultKind::Draw,
            Some(winner) if winner == mark => ResultKind::Win,
            Some(_) => ResultKind::Lose,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Winner(mark) => write!(f, "{mark} wins"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}

/// Result relative to one participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResultKind {
    /// This player completed a line.
    Win,
    /// The opponent completed a line.
    Lose,
    /// Nobody did.
    Draw,
}

/// Per-player result delivered when a match concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    /// Win, lose or draw for the recipient.
    pub result: ResultKind,
    /// Whole seconds between match creation and the result query.
    pub duration_seconds: u64,
}
