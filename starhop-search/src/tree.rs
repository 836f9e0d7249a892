//! Search tree structure and node management
//!
//! Uses arena allocation with generational ids, so a queued id that outlives
//! its node (after a re-root released it) resolves to nothing instead of to a
//! recycled slot.
//!
//! ## Architecture
//! - Level 2: Tree operations (expand, reroot, prune)
//! - Level 3: Max-backpropagation, child construction
//! - Level 4: Statistics, utilities

use std::time::{Duration, Instant};

use starhop_core::{moves_from, Board, CoreError, HopChain, MoveMap, Point};

use crate::eval::Evaluator;
use crate::node::{MoveKey, SearchNode};
use crate::SearchConfig;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// TYPES
// ============================================================================

/// Node identifier (arena index plus slot generation)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<SearchNode>,
}

/// Result of moving the root onto one of its children
#[derive(Clone, Copy, Debug)]
pub struct RerootOutcome {
    /// Nodes discarded with the old root
    pub pruned: usize,
    /// Time spent marking and releasing them
    pub elapsed: Duration,
}

// ============================================================================
// SEARCH TREE (Level 2 - Tree Operations)
// ============================================================================

/// Game tree rooted at the current position
pub struct SearchTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
    evaluator: Box<dyn Evaluator>,
}

impl SearchTree {
    /// Build a tree from a starting board
    ///
    /// `evaluator_factory` runs once, against the finished root, and may
    /// precompute whatever it needs about the agent's goal.
    pub fn root_init<F>(
        board: Board,
        evaluator_factory: F,
        agent_player: usize,
        starting_player: usize,
    ) -> Result<Self, CoreError>
    where
        F: FnOnce(&SearchNode) -> Result<Box<dyn Evaluator>, CoreError>,
    {
        let root = SearchNode::root(board, agent_player, starting_player)?;
        let evaluator = evaluator_factory(&root)?;
        Ok(Self {
            slots: vec![Slot { generation: 0, node: Some(root) }],
            free: Vec::new(),
            root: NodeId::new(0, 0),
            live: 1,
            evaluator,
        })
    }

    /// Build a tree scored by the evaluator named in `config`
    pub fn new(
        board: Board,
        config: &SearchConfig,
        agent_player: usize,
        starting_player: usize,
    ) -> Result<Self, CoreError> {
        let (kind, seed) = (config.evaluator, config.seed);
        Self::root_init(board, |root| kind.build(root, seed), agent_player, starting_player)
    }

    /// Get the root node id
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get the root node
    pub fn root_node(&self) -> &SearchNode {
        match self.get(self.root) {
            Some(node) => node,
            None => unreachable!("root slot is never released"),
        }
    }

    /// Get a node, `None` once it has been released
    pub fn get(&self, id: NodeId) -> Option<&SearchNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut SearchNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Number of live nodes in the arena
    pub fn len(&self) -> usize {
        self.live
    }

    /// Is the tree empty?
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn insert(&mut self, node: SearchNode) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId::new(index, 0)
            }
        }
    }

    fn remove(&mut self, id: NodeId) -> Option<SearchNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    // ========================================================================
    // Level 2: Expansion
    // ========================================================================

    /// Attach every legal child of `id`
    ///
    /// Moves are generated for each piece of the node's player to move; each
    /// new child is scored and max-backpropagated. Keys that already exist are
    /// kept as they are. Returns the ids of all children; a node where every
    /// player has finished has none.
    pub fn expand(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        if node.expanded {
            return node.children.values().copied().collect();
        }
        if node.is_terminal() {
            if let Some(node) = self.get_mut(id) {
                node.expanded = true;
            }
            return Vec::new();
        }

        let move_maps = piece_moves(node);
        let mut children = Vec::new();
        for (piece, moves) in move_maps {
            for (dest, chain) in moves {
                if let Some(child) = self.new_child(id, (piece, dest), chain) {
                    children.push(child);
                }
            }
        }

        if let Some(node) = self.get_mut(id) {
            node.expanded = true;
        }
        children
    }

    /// Build, score and attach one child; backpropagates new children
    ///
    /// Returns the existing child when the key is already present.
    pub fn new_child(&mut self, parent: NodeId, key: MoveKey, chain: HopChain) -> Option<NodeId> {
        let parent_node = self.get(parent)?;
        if let Some(existing) = parent_node.child(key) {
            return Some(existing);
        }

        let mut child = SearchNode::from_parent(parent_node, parent, chain);
        child.score = self.evaluator.score(&child);

        let child_id = self.insert(child);
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.insert(key, child_id);
        }
        self.backprop_max(child_id);
        Some(child_id)
    }

    // ========================================================================
    // Level 3: Backpropagation
    // ========================================================================

    /// Raise ancestors' scores to this node's score while it is higher
    ///
    /// Greedy max, not minimax: every descendant counts as a candidate
    /// position for the agent regardless of whose turn produced it.
    pub fn backprop_max(&mut self, id: NodeId) {
        let mut current = id;
        while let Some(node) = self.get(current) {
            let score = node.score;
            let Some(parent_id) = node.parent else {
                break;
            };
            let Some(parent) = self.get_mut(parent_id) else {
                break;
            };
            if score <= parent.score {
                break;
            }
            parent.score = score;
            parent.best_child = Some(current);
            current = parent_id;
        }
    }

    // ========================================================================
    // Level 2: Teardown
    // ========================================================================

    /// Mark a node and every descendant as pruned; returns how many
    pub fn prune(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut pruned = 0;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get_mut(current) {
                node.pruned = true;
                pruned += 1;
                stack.extend(node.children.values().copied());
            }
        }
        pruned
    }

    /// Free the arena slots of a subtree; returns how many were freed
    pub fn release(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut released = 0;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.remove(current) {
                released += 1;
                stack.extend(node.children.into_values());
            }
        }
        released
    }

    /// Count the nodes of a subtree
    pub fn size(&self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut size = 0;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                size += 1;
                stack.extend(node.children.values().copied());
            }
        }
        size
    }

    /// Make the child reached by `(source, dest)` the new root
    ///
    /// The child is detached from its parent (no parent, score reset) and the
    /// rest of the old tree is pruned and released. Returns `None`, leaving
    /// the tree untouched, if the root has no such child.
    pub fn reroot(&mut self, source: Point, dest: Point) -> Option<RerootOutcome> {
        let old_root = self.root;
        let new_root = self.get_mut(old_root)?.children.remove(&(source, dest))?;

        if let Some(node) = self.get_mut(new_root) {
            node.detach();
        }
        self.root = new_root;

        let started = Instant::now();
        let pruned = self.prune(old_root);
        self.release(old_root);
        Some(RerootOutcome {
            pruned,
            elapsed: started.elapsed(),
        })
    }

    // ========================================================================
    // Level 3: Best Move Selection
    // ========================================================================

    /// Hop chain of the root's best child
    ///
    /// Falls back to the highest scoring child when no child has beaten the
    /// root's score yet.
    pub fn best_move(&self) -> Option<HopChain> {
        let root = self.root_node();
        let best = root
            .best_child
            .and_then(|id| self.get(id))
            .or_else(|| {
                root.children
                    .values()
                    .filter_map(|&id| self.get(id))
                    .max_by(|a, b| a.score.total_cmp(&b.score))
            })?;
        Some(best.hop_chain().to_vec())
    }
}

// ============================================================================
// Level 4: Utilities
// ============================================================================

/// Moves for every piece of the node's player to move, sorted by piece
fn piece_moves(node: &SearchNode) -> Vec<(Point, MoveMap)> {
    let mut pieces: Vec<Point> = node.pieces(node.current_player()).collect();
    pieces.sort_unstable();
    let board = node.board();

    #[cfg(feature = "parallel")]
    let maps = pieces.par_iter().map(|&p| (p, moves_from(board, p))).collect();
    #[cfg(not(feature = "parallel"))]
    let maps = pieces.iter().map(|&p| (p, moves_from(board, p))).collect();

    maps
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Evaluator;

    /// Scores a node by how far the agent's pieces have advanced in x
    struct AdvanceEvaluator;

    impl Evaluator for AdvanceEvaluator {
        fn score(&mut self, node: &SearchNode) -> f32 {
            node.pieces(node.agent_player()).map(|p| p.x as f32).sum::<f32>() / 100.0
        }
    }

    /// Returns scores from a fixed script, then 0
    struct ScriptedEvaluator(Vec<f32>);

    impl Evaluator for ScriptedEvaluator {
        fn score(&mut self, _node: &SearchNode) -> f32 {
            if self.0.is_empty() {
                0.0
            } else {
                self.0.remove(0)
            }
        }
    }

    fn two_player_tree() -> SearchTree {
        let board = Board::initial(2).unwrap();
        SearchTree::root_init(board, |_| Ok(Box::new(AdvanceEvaluator)), 2, 2).unwrap()
    }

    fn scripted_tree(scores: Vec<f32>) -> SearchTree {
        let board = Board::initial(2).unwrap();
        SearchTree::root_init(board, move |_| Ok(Box::new(ScriptedEvaluator(scores))), 1, 1)
            .unwrap()
    }

    #[test]
    fn test_tree_creation() {
        let tree = two_player_tree();
        assert_eq!(tree.len(), 1);
        assert!(tree.root_node().parent().is_none());
        assert_eq!(tree.root_node().num_children(), 0);
    }

    #[test]
    fn test_factory_runs_against_root() {
        let board = Board::initial(2).unwrap();
        let mut seen = None;
        let tree = SearchTree::root_init(
            board,
            |root| {
                seen = Some((root.agent_player(), root.num_players()));
                Ok(Box::new(AdvanceEvaluator))
            },
            1,
            2,
        );
        assert!(tree.is_ok());
        assert_eq!(seen, Some((1, 2)));
    }

    #[test]
    fn test_factory_error_propagates() {
        let board = Board::initial(2).unwrap();
        let tree = SearchTree::root_init(
            board,
            |_| Err(CoreError::UnsupportedPlayerCount(5)),
            1,
            2,
        );
        assert!(tree.is_err());
    }

    #[test]
    fn test_tree_expansion() {
        let mut tree = two_player_tree();
        let root = tree.root();
        let children = tree.expand(root);

        let expected: usize = tree
            .root_node()
            .pieces(2)
            .map(|p| moves_from(tree.root_node().board(), p).len())
            .sum();
        assert_eq!(children.len(), expected);
        assert_eq!(tree.root_node().num_children(), expected);
        assert_eq!(tree.len(), expected + 1);

        for id in children {
            let child = tree.get(id).unwrap();
            assert_eq!(child.parent(), Some(root));
            assert_eq!(child.current_player(), 1);
            let chain = child.hop_chain();
            assert_eq!(tree.root_node().child((chain[0], chain[chain.len() - 1])), Some(id));
        }
    }

    #[test]
    fn test_expand_is_idempotent() {
        let mut tree = two_player_tree();
        let root = tree.root();
        let first = tree.expand(root);
        let size = tree.len();
        let mut second = tree.expand(root);
        let mut first_sorted = first.clone();
        first_sorted.sort_by_key(|id| (id.index, id.generation));
        second.sort_by_key(|id| (id.index, id.generation));
        assert_eq!(first_sorted, second);
        assert_eq!(tree.len(), size);
    }

    #[test]
    fn test_backpropagation_is_max() {
        let mut tree = two_player_tree();
        let root = tree.root();
        let children = tree.expand(root);
        for &child in &children {
            tree.expand(child);
        }

        // Every node's score dominates every descendant's score
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = tree.get(id).unwrap();
            for (_, child) in node.children() {
                assert!(node.score >= tree.get(child).unwrap().score);
                stack.push(child);
            }
        }

        // The root holds the maximum over all descendants
        let max = children
            .iter()
            .flat_map(|&c| {
                let node = tree.get(c).unwrap();
                std::iter::once(node.score)
                    .chain(node.children().map(|(_, g)| tree.get(g).unwrap().score))
            })
            .fold(f32::MIN, f32::max);
        assert_eq!(tree.root_node().score, max);
    }

    #[test]
    fn test_backprop_strictly_greater_only() {
        let mut tree = scripted_tree(vec![5.0, 5.0, 7.0]);
        let root = tree.root();
        let a = tree
            .new_child(root, (Point::new(9, 3), Point::new(9, 4)), vec![Point::new(9, 3), Point::new(9, 4)])
            .unwrap();
        assert_eq!(tree.root_node().best_child, Some(a));

        // Equal score does not take over
        let b = tree
            .new_child(root, (Point::new(10, 3), Point::new(10, 4)), vec![Point::new(10, 3), Point::new(10, 4)])
            .unwrap();
        assert_eq!(tree.root_node().best_child, Some(a));
        assert_eq!(tree.root_node().score, 5.0);

        // A deeper, higher score rewires the whole chain
        let chain = vec![Point::new(7, 13), Point::new(7, 12)];
        let c = tree.new_child(b, (chain[0], chain[1]), chain).unwrap();
        assert_eq!(tree.get(b).unwrap().best_child, Some(c));
        assert_eq!(tree.get(b).unwrap().score, 7.0);
        assert_eq!(tree.root_node().best_child, Some(b));
        assert_eq!(tree.root_node().score, 7.0);
    }

    #[test]
    fn test_prune_counts_whole_subtree() {
        let mut tree = two_player_tree();
        let root = tree.root();
        let children = tree.expand(root);
        tree.expand(children[0]);
        tree.expand(children[1]);

        let size = tree.size(root);
        assert_eq!(size, tree.len());
        let pruned = tree.prune(root);
        assert_eq!(pruned, size);

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = tree.get(id).unwrap();
            assert!(node.pruned);
            stack.extend(node.children().map(|(_, c)| c));
        }
    }

    #[test]
    fn test_reroot_detaches_child() {
        let mut tree = two_player_tree();
        let root = tree.root();
        let children = tree.expand(root);
        let target = children[0];
        tree.expand(target);

        let (chain, grandchildren, board) = {
            let node = tree.get(target).unwrap();
            let mut kids: Vec<_> = node.children().collect();
            kids.sort_by_key(|(k, _)| *k);
            (node.hop_chain().to_vec(), kids, node.board().clone())
        };
        let subtree = tree.size(target);
        let total = tree.len();

        let outcome = tree
            .reroot(chain[0], *chain.last().unwrap())
            .unwrap();

        assert_eq!(tree.root(), target);
        assert!(tree.root_node().parent().is_none());
        assert_eq!(tree.root_node().score, 0.0);
        assert_eq!(tree.root_node().board(), &board);
        let mut kids: Vec<_> = tree.root_node().children().collect();
        kids.sort_by_key(|(k, _)| *k);
        assert_eq!(kids, grandchildren);

        assert_eq!(outcome.pruned, total - subtree);
        assert_eq!(tree.len(), subtree);
        // Discarded ids no longer resolve, even after slot reuse
        assert!(tree.get(root).is_none());
        assert!(tree.get(children[1]).is_none());
    }

    #[test]
    fn test_reroot_unknown_move() {
        let mut tree = two_player_tree();
        let root = tree.root();
        assert!(tree.reroot(Point::new(8, 8), Point::new(9, 8)).is_none());
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn test_released_slots_are_reused() {
        let mut tree = two_player_tree();
        let root = tree.root();
        let children = tree.expand(root);
        let chain = tree.get(children[0]).unwrap().hop_chain().to_vec();
        tree.reroot(chain[0], *chain.last().unwrap()).unwrap();
        let arena = tree.slots.len();

        let new_root = tree.root();
        tree.expand(new_root);
        assert!(tree.slots.len() <= arena.max(tree.len()));
        for (_, id) in tree.root_node().children() {
            assert!(tree.get(id).is_some());
        }
    }

    /// Player 2 already fills slot 0; player 1 is one step from filling slot 3
    fn last_move_board() -> (Board, HopChain) {
        let mut board = Board::empty_star();
        for p in starhop_core::slot_cells(0) {
            board.set(p, 2);
        }
        let goal = starhop_core::slot_cells(3);
        for &p in &goal[1..] {
            board.set(p, 1);
        }
        let from = Point::new(4, 12);
        board.set(from, 1);
        (board, vec![from, goal[0]])
    }

    #[test]
    fn test_finished_game_has_no_children() {
        let (board, chain) = last_move_board();
        let mut tree =
            SearchTree::root_init(board, |_| Ok(Box::new(AdvanceEvaluator)), 1, 1).unwrap();
        let root = tree.root();
        let end = tree
            .new_child(root, (chain[0], chain[1]), chain)
            .unwrap();
        assert!(tree.get(end).unwrap().is_terminal());
        assert_eq!(tree.get(end).unwrap().remaining_players(), 0);

        let size = tree.len();
        assert!(tree.expand(end).is_empty());
        assert!(tree.expand(end).is_empty());
        assert_eq!(tree.len(), size);
        assert_eq!(tree.get(end).unwrap().num_children(), 0);
    }

    #[test]
    fn test_best_move_fallback() {
        let mut tree = scripted_tree(vec![0.0, 0.0, 0.0]);
        assert!(tree.best_move().is_none());
        let root = tree.root();
        tree.expand(root);
        // No child beat the root's zero, yet a move is still reported
        assert!(tree.root_node().best_child.is_none());
        let best = tree.best_move().unwrap();
        assert!(best.len() >= 2);
    }

    #[test]
    fn test_best_move_follows_best_child() {
        let mut tree = two_player_tree();
        let root = tree.root();
        tree.expand(root);
        let best = tree.root_node().best_child.unwrap();
        let chain = tree.get(best).unwrap().hop_chain().to_vec();
        assert_eq!(tree.best_move(), Some(chain));
    }
}
