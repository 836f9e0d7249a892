//! STARHOP Core - Chinese-checkers board and move rules
//!
//! This crate provides the board-level game logic:
//! - Star board geometry (17x17 axial grid)
//! - Slot table (start and goal triangles per player count)
//! - Hop geometry and chain validation
//! - Multi-hop reachable-destination search

pub mod board;
pub mod error;
pub mod hops;
pub mod movegen;
pub mod slots;

// Re-exports for convenient access
pub use board::{Board, Point, BOARD_SIZE, DIRECTIONS, EMPTY, OFF_BOARD};
pub use error::{CoreError, MoveError};
pub use hops::{gap_pattern, hop_is_straight, is_valid_hop, validate_chain, Direction, HopChain};
pub use movegen::{moves_from, MoveMap};
pub use slots::{goal_slot, goal_slots, slot_cells, start_slots, SLOT_ENDPOINTS};
