//! The match state machine.
//!
//! A [`Match`] moves `pending -> active -> concluded` and never backwards.
//! Moves go through [`Match::apply_move`] only; every rejection leaves the
//! match exactly as it was.

use crate::action::MoveRecord;
use crate::error::{MatchError, MoveError};
use crate::outcome::{Outcome, PlayerResult};
use crate::rules;
use crate::snapshot::{MatchSnapshot, SeatView};
use crate::types::{Board, CELL_COUNT, Mark, MatchId, Phase, PlayerRef, Seat};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

/// One tic-tac-toe contest between two distinct players.
#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    seats: [Seat; 2],
    board: Board,
    turn: Mark,
    phase: Phase,
    outcome: Option<Outcome>,
    winning_line: Option<[usize; 3]>,
    move_log: Vec<MoveRecord>,
    created_at: DateTime<Utc>,
    concluded_at: Option<DateTime<Utc>>,
}

impl Match {
    /// Creates a pending match. `first` plays X and moves first.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::DuplicatePlayer`] if both players share an id.
    pub fn new(first: PlayerRef, second: PlayerRef) -> Result<Self, MatchError> {
        Self::with_id(MatchId::new(), first, second, Utc::now())
    }

    /// Creates a pending match with an explicit id and creation time.
    #[instrument(skip(first, second), fields(first = %first.id, second = %second.id))]
    pub fn with_id(
        id: MatchId,
        first: PlayerRef,
        second: PlayerRef,
        created_at: DateTime<Utc>,
    ) -> Result<Self, MatchError> {
        if first.id == second.id {
            return Err(MatchError::DuplicatePlayer(first.id));
        }

        debug!(match_id = %id, "Creating match");
        Ok(Self {
            id,
            seats: [
                Seat {
                    player: first,
                    mark: Mark::X,
                },
                Seat {
                    player: second,
                    mark: Mark::O,
                },
            ],
            board: Board::new(),
            turn: Mark::X,
            phase: Phase::Pending,
            outcome: None,
            winning_line: None,
            move_log: Vec::new(),
            created_at,
            concluded_at: None,
        })
    }

    /// Opens the match for moves.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotPending`] unless the match is pending.
    #[instrument(skip(self), fields(match_id = %self.id))]
    pub fn start(&mut self) -> Result<(), MatchError> {
        if self.phase != Phase::Pending {
            return Err(MatchError::NotPending(self.phase));
        }
        self.phase = Phase::Active;
        debug!("Match started");
        Ok(())
    }

    /// Applies a move for `player_id` at `cell` and returns the new snapshot.
    ///
    /// Checks, in order: the match is active, the mover holds the turn, the
    /// index is on the board, the cell is empty.
    pub fn apply_move(&mut self, player_id: &str, cell: usize) -> Result<MatchSnapshot, MoveError> {
        self.apply_move_at(player_id, cell, Utc::now())
    }

    /// [`apply_move`](Self::apply_move) with an explicit timestamp.
    #[instrument(skip(self, at), fields(match_id = %self.id))]
    pub fn apply_move_at(
        &mut self,
        player_id: &str,
        cell: usize,
        at: DateTime<Utc>,
    ) -> Result<MatchSnapshot, MoveError> {
        if self.phase != Phase::Active {
            return Err(MoveError::NotActive(self.phase));
        }
        if self.current_seat().player.id != player_id {
            return Err(MoveError::NotYourTurn);
        }
        if cell >= CELL_COUNT {
            return Err(MoveError::OutOfRange);
        }

        let mark = self.turn;
        if !self.board.claim(cell, mark) {
            return Err(MoveError::CellOccupied(cell));
        }

        self.move_log.push(MoveRecord {
            player_id: player_id.to_string(),
            symbol: mark,
            cell_index: cell,
            timestamp: at,
        });
        debug!(%mark, cell, "Move accepted");

        self.evaluate(at);
        Ok(self.snapshot())
    }

    // Win before draw: a full board that completes a line is a win.
    fn evaluate(&mut self, at: DateTime<Utc>) {
        if let Some((mark, line)) = rules::winning_line(&self.board) {
            self.conclude(Outcome::Winner(mark), Some(line), at);
        } else if rules::is_full(&self.board) {
            self.conclude(Outcome::Draw, None, at);
        } else {
            self.turn = self.turn.opponent();
        }
    }

    fn conclude(&mut self, outcome: Outcome, line: Option<[usize; 3]>, at: DateTime<Utc>) {
        self.phase = Phase::Concluded;
        self.outcome = Some(outcome);
        self.winning_line = line;
        self.concluded_at = Some(at);
        info!(match_id = %self.id, %outcome, moves = self.move_log.len(), "Match concluded");
    }

    /// Result for `player_id`, or `None` if the match has not concluded or
    /// the player is not seated here.
    pub fn result_for(&self, player_id: &str) -> Option<PlayerResult> {
        self.result_at(player_id, Utc::now())
    }

    /// [`result_for`](Self::result_for) measured at `now`.
    pub fn result_at(&self, player_id: &str, now: DateTime<Utc>) -> Option<PlayerResult> {
        if self.phase != Phase::Concluded {
            return None;
        }
        let outcome = self.outcome?;
        let seat = self.seat_of(player_id)?;
        let duration_seconds = u64::try_from((now - self.created_at).num_seconds()).unwrap_or(0);

        Some(PlayerResult {
            result: outcome.for_mark(seat.mark),
            duration_seconds,
        })
    }

    /// Match id.
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Outcome, once concluded.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Completed line, for a win.
    pub fn winning_line(&self) -> Option<[usize; 3]> {
        self.winning_line
    }

    /// Mark holding the turn.
    pub fn turn(&self) -> Mark {
        self.turn
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Accepted moves, oldest first.
    pub fn move_log(&self) -> &[MoveRecord] {
        &self.move_log
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the match concluded.
    pub fn concluded_at(&self) -> Option<DateTime<Utc>> {
        self.concluded_at
    }

    /// Checks whether the match has concluded.
    pub fn is_concluded(&self) -> bool {
        self.phase == Phase::Concluded
    }

    /// Both seats, X first.
    pub fn seats(&self) -> &[Seat; 2] {
        &self.seats
    }

    /// Seat owning `mark`.
    pub fn seat(&self, mark: Mark) -> &Seat {
        match mark {
            Mark::X => &self.seats[0],
            Mark::O => &self.seats[1],
        }
    }

    /// Seat holding the turn.
    pub fn current_seat(&self) -> &Seat {
        self.seat(self.turn)
    }

    /// Seat occupied by `player_id`.
    pub fn seat_of(&self, player_id: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.player.id == player_id)
    }

    /// Seat facing `player_id`, if `player_id` is seated here.
    pub fn opponent_of(&self, player_id: &str) -> Option<&Seat> {
        self.seat_of(player_id).map(|s| self.seat(s.mark.opponent()))
    }

    /// Checks whether `player_id` occupies a seat.
    pub fn contains(&self, player_id: &str) -> bool {
        self.seat_of(player_id).is_some()
    }

    /// Builds a snapshot for clients.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            board: self.board.cells().map(|c| c.mark()),
            current_player: SeatView::from(self.current_seat()),
            slot_a: SeatView::from(&self.seats[0]),
            slot_b: SeatView::from(&self.seats[1]),
            phase: self.phase,
            outcome: self.outcome,
            winning_line: self.winning_line,
            move_log: self.move_log.clone(),
            created_at: self.created_at,
        }
    }
}
