//! Hop geometry: straight-line test, gap patterns and chain validation
//!
//! A hop is either a single step onto an adjacent empty cell or a jump over
//! exactly one piece that lands as far past the piece as the piece was from
//! the start.

use crate::board::{Board, Point, EMPTY, OFF_BOARD};
use crate::error::MoveError;

/// Ordered hop sequence from source to destination
pub type HopChain = Vec<Point>;

/// Unit step and hop length between two colinear points
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Direction {
    pub dx: i8,
    pub dy: i8,
    pub steps: i8,
}

/// Check that `dest` lies on one of the hex lines through `source`
///
/// Uses cube coordinates `(x, y, -x-y)`: the cube-space Euclidean length
/// divided by sqrt(2) must be a whole number `d`, and the difference must
/// divide evenly by `d`.
pub fn hop_is_straight(source: Point, dest: Point) -> Option<Direction> {
    let dx = dest.x as i32 - source.x as i32;
    let dy = dest.y as i32 - source.y as i32;
    let dz = -dx - dy;

    // dx + dy + dz == 0 so the sum of squares is always even
    let half_sq = (dx * dx + dy * dy + dz * dz) / 2;
    let d = integer_sqrt(half_sq)?;
    if d == 0 || dx % d != 0 || dy % d != 0 {
        return None;
    }

    Some(Direction {
        dx: (dx / d) as i8,
        dy: (dy / d) as i8,
        steps: d as i8,
    })
}

/// Exact square root, `None` for non-squares
fn integer_sqrt(n: i32) -> Option<i32> {
    let root = (n as f64).sqrt().round() as i32;
    (root * root == n).then_some(root)
}

/// Run lengths of empty cells strictly between `source` and `dest`
///
/// Each occupied cell closes the current run and opens a new one, so a clean
/// jump over one piece yields two runs. Returns `None` if the walk crosses an
/// off-board cell.
pub fn gap_pattern(board: &Board, source: Point, dest: Point, dir: Direction) -> Option<Vec<u8>> {
    let mut gaps = vec![0u8];
    let mut cur = source.offset((dir.dx, dir.dy), 1);
    while cur != dest {
        match board.get(cur) {
            EMPTY => {
                if let Some(last) = gaps.last_mut() {
                    *last += 1;
                }
            }
            OFF_BOARD => return None,
            _ => gaps.push(0),
        }
        cur = cur.offset((dir.dx, dir.dy), 1);
    }
    Some(gaps)
}

/// Validate a single hop on `board`
///
/// `allow_single` permits an adjacent step; jumps are always allowed.
pub fn is_valid_hop(board: &Board, source: Point, dest: Point, allow_single: bool) -> bool {
    if !source.in_bounds() || !dest.in_bounds() || !board.is_empty(dest) {
        return false;
    }

    let Some(dir) = hop_is_straight(source, dest) else {
        return false;
    };

    match gap_pattern(board, source, dest, dir).as_deref() {
        Some([0]) => allow_single,
        Some([before, after]) => before == after,
        _ => false,
    }
}

/// Validate a full hop chain for `player` without changing the board
///
/// The moving piece's own cell counts as empty while checking hops.
pub fn validate_chain(board: &Board, chain: &[Point], player: i8) -> Result<(), MoveError> {
    if chain.len() < 2 {
        return Err(MoveError::TooShort(chain.len()));
    }
    if let Some(&p) = chain.iter().find(|p| !p.in_bounds()) {
        return Err(MoveError::OutOfBounds(p));
    }

    let source = chain[0];
    let found = board.get(source);
    if found != player {
        return Err(MoveError::NotOwnPiece { at: source, found, player });
    }

    let mut scratch = board.clone();
    scratch.set(source, EMPTY);

    let allow_single = chain.len() == 2;
    for pair in chain.windows(2) {
        if !is_valid_hop(&scratch, pair[0], pair[1], allow_single) {
            return Err(MoveError::InvalidHop { from: pair[0], to: pair[1] });
        }
    }
    Ok(())
}
