//! Position evaluation
//!
//! An evaluator is built once per tree, against its root, and then scores
//! every node the tree creates. Higher is better for the agent.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use starhop_core::{slot_cells, CoreError, Point, SLOT_ENDPOINTS};

use crate::node::SearchNode;

/// Score returned once every goal cell holds one of the agent's pieces
pub const FILLED_GOAL_SCORE: f32 = 1_000_000.0;

/// Scores search nodes for one agent
pub trait Evaluator: Send {
    fn score(&mut self, node: &SearchNode) -> f32;
}

// ============================================================================
// EVALUATOR REGISTRY
// ============================================================================

/// Evaluator selectable by name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    Random,
    #[default]
    Distance,
}

impl EvaluatorKind {
    pub const ALL: [EvaluatorKind; 2] = [EvaluatorKind::Random, EvaluatorKind::Distance];

    pub fn name(self) -> &'static str {
        match self {
            EvaluatorKind::Random => "random",
            EvaluatorKind::Distance => "distance",
        }
    }

    /// Build an evaluator for the tree rooted at `root`
    pub fn build(self, root: &SearchNode, seed: Option<u64>) -> Result<Box<dyn Evaluator>, CoreError> {
        Ok(match self {
            EvaluatorKind::Random => Box::new(RandomEvaluator::new(seed)),
            EvaluatorKind::Distance => Box::new(DistanceEvaluator::new(root)?),
        })
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EvaluatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown evaluator '{}' (expected random or distance)", s))
    }
}

// ============================================================================
// RANDOM
// ============================================================================

/// Uniform integer score in 1..=100
pub struct RandomEvaluator {
    rng: ChaCha8Rng,
}

impl RandomEvaluator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }
}

impl Evaluator for RandomEvaluator {
    fn score(&mut self, _node: &SearchNode) -> f32 {
        self.rng.gen_range(1..=100) as f32
    }
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Inverse total hex distance from the agent's pieces to the deepest open goal cell
pub struct DistanceEvaluator {
    agent: i8,
    /// Goal cells, closest to the slot's tip first
    targets: Vec<Point>,
}

impl DistanceEvaluator {
    pub fn new(root: &SearchNode) -> Result<Self, CoreError> {
        let num_players = root.num_players();
        let slot = starhop_core::goal_slot(num_players, root.agent_player())?;
        let tip = SLOT_ENDPOINTS[slot];

        let mut targets = slot_cells(slot).to_vec();
        targets.sort_by_key(|p| {
            let dx = i32::from(p.x - tip.x);
            let dy = i32::from(p.y - tip.y);
            dx * dx + dy * dy
        });

        Ok(Self {
            agent: root.agent_player() as i8,
            targets,
        })
    }

    /// First goal cell, in tip order, not yet holding an agent piece
    fn open_target(&self, node: &SearchNode) -> Option<Point> {
        self.targets
            .iter()
            .copied()
            .find(|&p| node.board().get(p) != self.agent)
    }
}

impl Evaluator for DistanceEvaluator {
    fn score(&mut self, node: &SearchNode) -> f32 {
        let Some(target) = self.open_target(node) else {
            return FILLED_GOAL_SCORE;
        };
        let dist: i32 = node
            .pieces(self.agent as usize)
            .map(|piece| piece.distance_to(target))
            .sum();
        1000.0 / dist.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhop_core::Board;

    fn root_for(board: Board, agent: usize) -> SearchNode {
        SearchNode::root(board, agent, 1).unwrap()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("random".parse::<EvaluatorKind>(), Ok(EvaluatorKind::Random));
        assert_eq!("distance".parse::<EvaluatorKind>(), Ok(EvaluatorKind::Distance));
        assert!("greedy".parse::<EvaluatorKind>().is_err());
        assert_eq!(EvaluatorKind::default(), EvaluatorKind::Distance);
        assert_eq!(EvaluatorKind::Random.to_string(), "random");
    }

    #[test]
    fn test_kind_serde() {
        let kind: EvaluatorKind = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(kind, EvaluatorKind::Random);
        assert_eq!(serde_json::to_string(&EvaluatorKind::Distance).unwrap(), "\"distance\"");
    }

    #[test]
    fn test_random_range_and_seed() {
        let root = root_for(Board::initial(2).unwrap(), 1);
        let mut a = RandomEvaluator::new(Some(7));
        let mut b = RandomEvaluator::new(Some(7));
        for _ in 0..200 {
            let score = a.score(&root);
            assert!((1.0..=100.0).contains(&score));
            assert_eq!(score.fract(), 0.0);
            assert_eq!(score, b.score(&root));
        }
    }

    #[test]
    fn test_distance_targets_start_at_tip() {
        let root = root_for(Board::initial(2).unwrap(), 2);
        let eval = DistanceEvaluator::new(&root).unwrap();
        // Player 2 in a 2 player game heads for slot 0
        assert_eq!(eval.targets[0], SLOT_ENDPOINTS[0]);
        assert_eq!(eval.targets.len(), 10);
    }

    #[test]
    fn test_distance_opening_score() {
        let board = Board::initial(2).unwrap();
        let root = root_for(board.clone(), 1);
        let mut eval = DistanceEvaluator::new(&root).unwrap();
        // Player 1 heads for slot 3, whose tip is (4, 16)
        let tip = SLOT_ENDPOINTS[3];
        let dist: i32 = board.pieces_of(1).map(|p| p.distance_to(tip)).sum();
        assert_eq!(eval.score(&root), 1000.0 / dist as f32);
    }

    #[test]
    fn test_distance_advancing_scores_higher() {
        let board = Board::initial(2).unwrap();
        let root = root_for(board.clone(), 1);
        let mut eval = DistanceEvaluator::new(&root).unwrap();
        let before = eval.score(&root);

        let mut advanced = board;
        advanced.apply_chain(&[Point::new(9, 3), Point::new(9, 4)]);
        let next = root_for(advanced, 1);
        assert!(eval.score(&next) > before);
    }

    #[test]
    fn test_distance_skips_filled_cells() {
        let mut board = Board::empty_star();
        board.set(SLOT_ENDPOINTS[3], 1);
        board.set(Point::new(8, 8), 1);
        board.set(Point::new(12, 0), 2);
        let root = root_for(board, 1);
        let mut eval = DistanceEvaluator::new(&root).unwrap();

        let target = eval.open_target(&root).unwrap();
        assert_ne!(target, SLOT_ENDPOINTS[3]);
        let dist = SLOT_ENDPOINTS[3].distance_to(target) + Point::new(8, 8).distance_to(target);
        assert_eq!(eval.score(&root), 1000.0 / dist as f32);
    }

    #[test]
    fn test_distance_filled_goal() {
        let mut board = Board::empty_star();
        for p in slot_cells(3) {
            board.set(p, 1);
        }
        board.set(Point::new(12, 0), 2);
        let root = root_for(board, 1);
        let mut eval = DistanceEvaluator::new(&root).unwrap();
        assert_eq!(eval.score(&root), FILLED_GOAL_SCORE);
    }

    #[test]
    fn test_build_from_kind() {
        let root = root_for(Board::initial(3).unwrap(), 3);
        for kind in EvaluatorKind::ALL {
            let mut eval = kind.build(&root, Some(1)).unwrap();
            assert!(eval.score(&root) > 0.0);
        }
    }
}
