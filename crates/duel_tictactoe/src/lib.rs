//! Two-player tic-tac-toe match logic.
//!
//! This crate knows nothing about connections, queues or timers. It owns the
//! rules and the per-match state machine that a coordinator drives:
//!
//! - **Types**: board, marks, seats, phases
//! - **Rules**: win and draw detection over the eight lines
//! - **Match**: `pending -> active -> concluded`, turn ownership, move log
//! - **Results**: outcome per seat and per player, serializable snapshots
//!
//! # Example
//!
//! ```
//! use duel_tictactoe::{Match, Outcome, Mark, PlayerRef};
//!
//! let mut game = Match::new(PlayerRef::new("p1", "Alice"), PlayerRef::new("p2", "Bob"))?;
//! game.start()?;
//! for (player, cell) in [("p1", 0), ("p2", 4), ("p1", 1), ("p2", 5), ("p1", 2)] {
//!     game.apply_move(player, cell)?;
//! }
//! assert_eq!(game.outcome(), Some(Outcome::Winner(Mark::X)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod error;
mod game;
mod outcome;
pub mod rules;
mod snapshot;
mod types;

pub use action::MoveRecord;
pub use error::{MatchError, MoveError};
pub use game::Match;
pub use outcome::{Outcome, PlayerResult, ResultKind};
pub use snapshot::{MatchSnapshot, SeatView};
pub use types::{Board, CELL_COUNT, Cell, Mark, MatchId, Phase, PlayerId, PlayerRef, Seat};
