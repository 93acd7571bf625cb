//! Terminal-state rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`](crate::Board). The match state machine
//! calls them after every accepted move, win check first.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::{LINES, winning_line};
