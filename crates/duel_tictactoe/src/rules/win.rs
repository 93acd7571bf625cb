//! Win detection.

use crate::types::{Board, Cell, Mark};
use tracing::instrument;

/// All eight winning triples: rows, columns, diagonals.
pub const LINES: [[usize; 3]; 8] = [
    // Rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // Columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // Diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the first triple holding three equal marks, with that mark.
#[instrument(level = "trace", skip(board))]
pub fn winning_line(board: &Board) -> Option<(Mark, [usize; 3])> {
    LINES.into_iter().find_map(|line @ [a, b, c]| {
        let cell = board.get(a)?;
        match cell {
            Cell::Occupied(mark) if board.get(b) == Some(cell) && board.get(c) == Some(cell) => {
                Some((mark, line))
            }
            _ => None,
        }
    })
}
