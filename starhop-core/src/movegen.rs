//! Reachable-destination search for a single piece
//!
//! Breadth-first search over jump landings. Single steps are only legal as the
//! whole move, so they are added from the seed and never expanded.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::board::{Board, Point, BOARD_SIZE, DIRECTIONS, EMPTY, OFF_BOARD};
use crate::hops::HopChain;

/// Destination -> hop chain that reaches it
pub type MoveMap = FxHashMap<Point, HopChain>;

/// Board view with the moving piece lifted off its cell
struct Lifted<'a> {
    board: &'a Board,
    source: Point,
}

impl Lifted<'_> {
    fn get(&self, p: Point) -> i8 {
        if p == self.source {
            EMPTY
        } else {
            self.board.get(p)
        }
    }

    /// Scan outward from `from`: k empties, one piece, k empties, landing
    fn scan(&self, from: Point, dir: (i8, i8)) -> Option<Point> {
        let mut cur = from.offset(dir, 1);
        let mut approach = 0;
        loop {
            match self.get(cur) {
                EMPTY => {
                    approach += 1;
                    cur = cur.offset(dir, 1);
                }
                OFF_BOARD => return None,
                _ => break,
            }
        }

        // `cur` is the jumped piece; the landing run mirrors the approach
        for _ in 0..=approach {
            cur = cur.offset(dir, 1);
            if self.get(cur) != EMPTY {
                return None;
            }
        }
        Some(cur)
    }
}

/// Every destination reachable by the piece on `source`, with its hop chain
///
/// The board is only read; the source cell is treated as empty so chains may
/// jump back across the piece's own origin.
pub fn moves_from(board: &Board, source: Point) -> MoveMap {
    let view = Lifted { board, source };
    let mut possible = MoveMap::default();
    let mut visited = [[false; BOARD_SIZE]; BOARD_SIZE];
    let mut queue = VecDeque::new();

    if !source.in_bounds() {
        return possible;
    }
    visited[source.x as usize][source.y as usize] = true;
    queue.push_back(source);

    for &dir in &DIRECTIONS {
        let step = source.offset(dir, 1);
        if view.get(step) == EMPTY {
            possible.insert(step, vec![source, step]);
        }
    }

    while let Some(from) = queue.pop_front() {
        for &dir in &DIRECTIONS {
            let Some(landing) = view.scan(from, dir) else {
                continue;
            };
            let seen = &mut visited[landing.x as usize][landing.y as usize];
            if *seen {
                continue;
            }
            *seen = true;
            queue.push_back(landing);

            let chain = if from == source {
                vec![source, landing]
            } else {
                let mut chain = possible.get(&from).cloned().unwrap_or_else(|| vec![source, from]);
                chain.push(landing);
                chain
            };
            possible.insert(landing, chain);
        }
    }

    possible
}
