//! Draw detection.

use crate::types::{Board, Cell};

/// Checks if every cell is occupied.
///
/// A full board is only a draw when [`winning_line`](super::winning_line)
/// finds nothing.
pub fn is_full(board: &Board) -> bool {
    board.cells().iter().all(|c| *c != Cell::Empty)
}

#[cfg(test)]
mod tests {
    use super::super::win::winning_line;
    use super::*;
    use crate::types::Mark;

    const X: Cell = Cell::Occupied(Mark::X);
    const O: Cell = Cell::Occupied(Mark::O);
    const E: Cell = Cell::Empty;

    #[test]
    fn test_empty_board_not_full() {
        assert!(!is_full(&Board::new()));
    }

    #[test]
    fn test_partial_board_not_full() {
        let board = Board::from_cells([X, O, X, E, E, E, E, E, E]);
        assert!(!is_full(&board));
    }

    #[test]
    fn test_full_board_without_line() {
        // X O X / O X X / O X O
        let board = Board::from_cells([X, O, X, O, X, X, O, X, O]);
        assert!(is_full(&board));
        assert_eq!(winning_line(&board), None);
    }

    #[test]
    fn test_full_board_with_line_still_has_winner() {
        // X X X / O O X / X O O
        let board = Board::from_cells([X, X, X, O, O, X, X, O, O]);
        assert!(is_full(&board));
        assert_eq!(winning_line(&board), Some((Mark::X, [0, 1, 2])));
    }
}
