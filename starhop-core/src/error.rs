//! Error types for board setup and move validation

use crate::board::Point;

/// Configuration and board-shape errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("unsupported number of players: {0} (expected 2, 3, 4 or 6)")]
    UnsupportedPlayerCount(usize),

    #[error("player {player} does not exist in a {num_players} player game")]
    UnknownPlayer { player: usize, num_players: usize },

    #[error("board must be {expected}x{expected}, got {rows} rows or a ragged row")]
    BadBoardShape { rows: usize, expected: usize },

    #[error("cell {at} holds {value}, expected -1, 0 or a player id up to {max}")]
    BadCellValue { at: Point, value: i8, max: i8 },
}

/// Reasons a submitted hop chain is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("hop chain needs at least two points, got {0}")]
    TooShort(usize),

    #[error("{0} is outside the board")]
    OutOfBounds(Point),

    #[error("piece at {at} belongs to {found}, not player {player}")]
    NotOwnPiece { at: Point, found: i8, player: i8 },

    #[error("invalid hop from {from} to {to}")]
    InvalidHop { from: Point, to: Point },
}
