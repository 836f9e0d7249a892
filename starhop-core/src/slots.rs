//! Slot geometry table
//!
//! A slot is one of the six triangles at the points of the star where pieces
//! start and finish. Slot 0 is the top-most one, then ascending clockwise.

use crate::board::Point;
use crate::error::CoreError;

/// Number of slots around the star
pub const NUM_SLOTS: usize = 6;

/// Cells per slot
pub const SLOT_LEN: usize = 10;

/// Closed-form slot bounds: (start_x, end_x, y_edge, pointing_up)
const SLOT_BOUNDS: [(i8, i8, i8, bool); NUM_SLOTS] = [
    (9, 12, 3, false),
    (13, 16, 4, true),
    (9, 12, 12, false),
    (4, 7, 13, true),
    (0, 3, 12, false),
    (4, 7, 4, true),
];

/// Outermost cell (tip) of each slot
pub const SLOT_ENDPOINTS: [Point; NUM_SLOTS] = [
    Point::new(12, 0),
    Point::new(16, 4),
    Point::new(12, 12),
    Point::new(4, 16),
    Point::new(0, 12),
    Point::new(4, 4),
];

/// Enumerate the ten cells of a slot
pub fn slot_cells(slot: usize) -> [Point; SLOT_LEN] {
    let (start_x, end_x, y_edge, pointing_up) = SLOT_BOUNDS[slot % NUM_SLOTS];
    let mut cells = [Point::new(0, 0); SLOT_LEN];
    let mut i = 0;
    for (row, x) in (start_x..=end_x).enumerate() {
        let row = row as i8;
        let ys = if pointing_up {
            y_edge..=y_edge + 3 - row
        } else {
            y_edge - row..=y_edge
        };
        for y in ys {
            cells[i] = Point::new(x, y);
            i += 1;
        }
    }
    cells
}

/// `goal_slots(n)[j]` is the slot player `j + 1` must fill in an `n` player game
pub fn goal_slots(num_players: usize) -> Result<&'static [usize], CoreError> {
    match num_players {
        2 => Ok(&[3, 0]),
        3 => Ok(&[4, 0, 2]),
        4 => Ok(&[4, 5, 1, 2]),
        6 => Ok(&[3, 4, 5, 0, 1, 2]),
        n => Err(CoreError::UnsupportedPlayerCount(n)),
    }
}

/// `start_slots(n)[j]` is the slot player `j + 1` starts in
pub fn start_slots(num_players: usize) -> Result<&'static [usize], CoreError> {
    match num_players {
        2 => Ok(&[0, 3]),
        3 => Ok(&[0, 2, 4]),
        4 => Ok(&[1, 2, 4, 5]),
        6 => Ok(&[0, 1, 2, 3, 4, 5]),
        n => Err(CoreError::UnsupportedPlayerCount(n)),
    }
}

/// Goal slot for one player
pub fn goal_slot(num_players: usize, player: usize) -> Result<usize, CoreError> {
    let slots = goal_slots(num_players)?;
    player
        .checked_sub(1)
        .and_then(|i| slots.get(i).copied())
        .ok_or(CoreError::UnknownPlayer { player, num_players })
}
