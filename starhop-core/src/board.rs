//! Star board geometry and cell storage
//!
//! The board is a 17x17 grid in axial coordinates. Only the star-shaped
//! playable region (a 9x9 rhombus plus six triangular slots) holds
//! non-negative values.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::slots::{slot_cells, start_slots, NUM_SLOTS};

/// Board edge length
pub const BOARD_SIZE: usize = 17;

/// Cell value for coordinates outside the star
pub const OFF_BOARD: i8 = -1;

/// Cell value for an empty playable cell
pub const EMPTY: i8 = 0;

/// Highest player id a cell can hold
pub const MAX_PLAYER: i8 = 6;

/// Bounds of the central rhombus (inclusive on both axes)
const RHOMBUS_MIN: i8 = 4;
const RHOMBUS_MAX: i8 = 12;

/// Unit step vectors (dx, dy) for the six hex neighbours
pub const DIRECTIONS: [(i8, i8); 6] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (-1, 1),
    (1, -1),
];

/// Board coordinate, serialised as `[x, y]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i8; 2]", into = "[i8; 2]")]
pub struct Point {
    pub x: i8,
    pub y: i8,
}

impl Point {
    pub const fn new(x: i8, y: i8) -> Self {
        Self { x, y }
    }

    /// Check if this point lies inside the 17x17 grid
    pub fn in_bounds(&self) -> bool {
        (0..BOARD_SIZE as i8).contains(&self.x) && (0..BOARD_SIZE as i8).contains(&self.y)
    }

    /// Point shifted by `(dx, dy)` scaled by `steps`
    pub fn offset(&self, (dx, dy): (i8, i8), steps: i8) -> Point {
        Point::new(self.x + dx * steps, self.y + dy * steps)
    }

    /// Hex distance between two points
    pub fn distance_to(&self, other: Point) -> i32 {
        let dx = (self.x as i32 - other.x as i32).abs();
        let dy = (self.y as i32 - other.y as i32).abs();
        let dz = ((self.x as i32 + self.y as i32) - (other.x as i32 + other.y as i32)).abs();
        (dx + dy + dz) / 2
    }
}

impl From<[i8; 2]> for Point {
    fn from([x, y]: [i8; 2]) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for [i8; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(i8, i8)> for Point {
    fn from((x, y): (i8, i8)) -> Self {
        Point::new(x, y)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 17x17 occupancy grid, serialised as nested JSON arrays indexed `[x][y]`
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i8>>", into = "Vec<Vec<i8>>")]
pub struct Board {
    cells: [[i8; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Board with the playable star empty and everything else off-board
    pub fn empty_star() -> Self {
        let mut cells = [[OFF_BOARD; BOARD_SIZE]; BOARD_SIZE];
        for x in RHOMBUS_MIN..=RHOMBUS_MAX {
            for y in RHOMBUS_MIN..=RHOMBUS_MAX {
                cells[x as usize][y as usize] = EMPTY;
            }
        }
        for slot in 0..NUM_SLOTS {
            for p in slot_cells(slot) {
                cells[p.x as usize][p.y as usize] = EMPTY;
            }
        }
        Self { cells }
    }

    /// Starting position for a game with `num_players` players
    pub fn initial(num_players: usize) -> Result<Self, CoreError> {
        let starts = start_slots(num_players)?;
        let mut board = Self::empty_star();
        for (i, &slot) in starts.iter().enumerate() {
            let player = (i + 1) as i8;
            for p in slot_cells(slot) {
                board.set(p, player);
            }
        }
        Ok(board)
    }

    /// Cell value, or `OFF_BOARD` outside the grid
    pub fn get(&self, p: Point) -> i8 {
        if p.in_bounds() {
            self.cells[p.x as usize][p.y as usize]
        } else {
            OFF_BOARD
        }
    }

    /// Overwrite a cell (ignored outside the grid)
    pub fn set(&mut self, p: Point, value: i8) {
        if p.in_bounds() {
            self.cells[p.x as usize][p.y as usize] = value;
        }
    }

    /// Is the cell playable and unoccupied
    pub fn is_empty(&self, p: Point) -> bool {
        self.get(p) == EMPTY
    }

    /// Highest player id present on the board
    pub fn num_players(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .copied()
            .max()
            .unwrap_or(EMPTY)
            .max(EMPTY) as usize
    }

    /// Coordinates occupied by `player`
    pub fn pieces_of(&self, player: i8) -> impl Iterator<Item = Point> + '_ {
        self.iter().filter(move |&(_, v)| v == player).map(|(p, _)| p)
    }

    /// Iterate every grid coordinate with its value
    pub fn iter(&self) -> impl Iterator<Item = (Point, i8)> + '_ {
        self.cells.iter().enumerate().flat_map(|(x, row)| {
            row.iter()
                .enumerate()
                .map(move |(y, &v)| (Point::new(x as i8, y as i8), v))
        })
    }

    /// Move whatever sits on the chain's source to its destination
    ///
    /// Does not validate the chain; see [`crate::hops::validate_chain`].
    pub fn apply_chain(&mut self, chain: &[Point]) {
        let (Some(&source), Some(&dest)) = (chain.first(), chain.last()) else {
            return;
        };
        let piece = self.get(source);
        self.set(source, EMPTY);
        self.set(dest, piece);
    }

    /// Every cell of `slot` holds `player`
    pub fn fills_slot(&self, slot: usize, player: i8) -> bool {
        slot_cells(slot).iter().all(|&p| self.get(p) == player)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty_star()
    }
}

impl TryFrom<Vec<Vec<i8>>> for Board {
    type Error = CoreError;

    fn try_from(rows: Vec<Vec<i8>>) -> Result<Self, Self::Error> {
        if rows.len() != BOARD_SIZE || rows.iter().any(|r| r.len() != BOARD_SIZE) {
            return Err(CoreError::BadBoardShape {
                rows: rows.len(),
                expected: BOARD_SIZE,
            });
        }
        let mut cells = [[OFF_BOARD; BOARD_SIZE]; BOARD_SIZE];
        for (x, row) in rows.iter().enumerate() {
            if let Some((y, &value)) = row
                .iter()
                .enumerate()
                .find(|&(_, &v)| !(OFF_BOARD..=MAX_PLAYER).contains(&v))
            {
                return Err(CoreError::BadCellValue {
                    at: Point::new(x as i8, y as i8),
                    value,
                    max: MAX_PLAYER,
                });
            }
            cells[x].copy_from_slice(row);
        }
        Ok(Self { cells })
    }
}

impl From<Board> for Vec<Vec<i8>> {
    fn from(board: Board) -> Self {
        board.cells.iter().map(|row| row.to_vec()).collect()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            for &v in row {
                match v {
                    OFF_BOARD => write!(f, " .")?,
                    v => write!(f, "{:2}", v)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_has_121_cells() {
        let board = Board::empty_star();
        let playable = board.iter().filter(|&(_, v)| v >= 0).count();
        assert_eq!(playable, 121);
    }

    #[test]
    fn test_initial_two_player_layout() {
        let board = Board::initial(2).unwrap();
        assert_eq!(board.get(Point::new(12, 0)), 1);
        assert_eq!(board.get(Point::new(9, 3)), 1);
        assert_eq!(board.get(Point::new(4, 16)), 2);
        assert_eq!(board.get(Point::new(7, 13)), 2);
        assert_eq!(board.get(Point::new(8, 8)), EMPTY);
        assert_eq!(board.get(Point::new(0, 0)), OFF_BOARD);
        assert_eq!(board.pieces_of(1).count(), 10);
        assert_eq!(board.pieces_of(2).count(), 10);
        assert_eq!(board.num_players(), 2);
    }

    #[test]
    fn test_initial_six_players() {
        let board = Board::initial(6).unwrap();
        for player in 1..=6 {
            assert_eq!(board.pieces_of(player).count(), 10);
        }
        assert_eq!(board.num_players(), 6);
    }

    #[test]
    fn test_initial_rejects_five_players() {
        assert!(Board::initial(5).is_err());
    }

    #[test]
    fn test_out_of_bounds_reads_off_board() {
        let board = Board::empty_star();
        assert_eq!(board.get(Point::new(-1, 4)), OFF_BOARD);
        assert_eq!(board.get(Point::new(4, 17)), OFF_BOARD);
    }

    #[test]
    fn test_distance() {
        assert_eq!(Point::new(8, 8).distance_to(Point::new(8, 8)), 0);
        assert_eq!(Point::new(8, 8).distance_to(Point::new(9, 7)), 1);
        assert_eq!(Point::new(8, 8).distance_to(Point::new(10, 10)), 4);
    }

    #[test]
    fn test_json_shape() {
        let board = Board::initial(2).unwrap();
        let json = serde_json::to_string(&board).unwrap();
        let back: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);

        let point: Point = serde_json::from_str("[12, 4]").unwrap();
        assert_eq!(point, Point::new(12, 4));

        let short: Result<Board, _> = serde_json::from_str("[[0, 1], [1, 0]]");
        assert!(short.is_err());
    }

    #[test]
    fn test_rejects_bad_cell_values() {
        let mut rows: Vec<Vec<i8>> = Board::initial(2).unwrap().into();
        rows[8][8] = -3;
        assert_eq!(
            Board::try_from(rows.clone()).unwrap_err(),
            CoreError::BadCellValue { at: Point::new(8, 8), value: -3, max: MAX_PLAYER }
        );
        rows[8][8] = 7;
        assert!(Board::try_from(rows.clone()).is_err());
        rows[8][8] = 6;
        assert!(Board::try_from(rows).is_ok());

        let mut json: Vec<Vec<i8>> = Board::empty_star().into();
        json[0][0] = -2;
        let text = serde_json::to_string(&json).unwrap();
        assert!(serde_json::from_str::<Board>(&text).is_err());
    }

    #[test]
    fn test_fills_slot() {
        let mut board = Board::initial(2).unwrap();
        assert!(board.fills_slot(0, 1));
        assert!(!board.fills_slot(3, 1));
        board.set(Point::new(12, 0), EMPTY);
        assert!(!board.fills_slot(0, 1));
    }

    #[test]
    fn test_apply_chain_moves_piece() {
        let mut board = Board::empty_star();
        board.set(Point::new(8, 8), 1);
        board.apply_chain(&[Point::new(8, 8), Point::new(9, 8)]);
        assert_eq!(board.get(Point::new(8, 8)), EMPTY);
        assert_eq!(board.get(Point::new(9, 8)), 1);
    }
}
