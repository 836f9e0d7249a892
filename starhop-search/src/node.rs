//! Search node: one fully specified future game state
//!
//! A node owns a private copy of the board and piece sets. It is built either
//! from a starting board (root) or from its parent plus one hop chain, and is
//! never mutated afterwards except for its score, best child and pruned flag.

use rustc_hash::{FxHashMap, FxHashSet};
use starhop_core::{goal_slots, Board, CoreError, HopChain, Point};

use crate::tree::NodeId;

/// Child map key: (source, destination) of the move that produced the child
pub type MoveKey = (Point, Point);

#[derive(Clone, Debug)]
pub struct SearchNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: FxHashMap<MoveKey, NodeId>,
    /// Move that produced this node (empty for the initial root)
    hop_chain: HopChain,
    board: Board,
    /// Indexed by player id; slot 0 is unused
    pieces: Vec<FxHashSet<Point>>,
    win_statuses: Vec<bool>,
    goal_slots: &'static [usize],
    remaining_players: usize,
    current_player: usize,
    agent_player: usize,
    /// Evaluator score, raised by max-backpropagation
    pub score: f32,
    pub best_child: Option<NodeId>,
    pub pruned: bool,
    /// Set once every legal child has been attached
    pub(crate) expanded: bool,
    pub depth: u32,
}

impl SearchNode {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Build a root from a raw board
    ///
    /// The player count is the highest cell value; only 2, 3, 4 and 6 player
    /// boards have a goal table.
    pub fn root(board: Board, agent_player: usize, starting_player: usize) -> Result<Self, CoreError> {
        let num_players = board.num_players();
        let goal_slots = goal_slots(num_players)?;
        for player in [agent_player, starting_player] {
            if player == 0 || player > num_players {
                return Err(CoreError::UnknownPlayer { player, num_players });
            }
        }

        let mut pieces = vec![FxHashSet::default(); num_players + 1];
        for (p, v) in board.iter() {
            if v > 0 {
                pieces[v as usize].insert(p);
            }
        }

        Ok(Self {
            parent: None,
            children: FxHashMap::default(),
            hop_chain: Vec::new(),
            board,
            pieces,
            win_statuses: vec![false; num_players + 1],
            goal_slots,
            remaining_players: num_players,
            current_player: starting_player,
            agent_player,
            score: 0.0,
            best_child: None,
            pruned: false,
            expanded: false,
            depth: 0,
        })
    }

    /// Build the state reached by playing `chain` from `parent`
    ///
    /// The chain must come from the move finder on the parent's board; the
    /// score is left at zero for the caller's evaluator.
    pub(crate) fn from_parent(parent: &SearchNode, parent_id: NodeId, chain: HopChain) -> Self {
        debug_assert!(
            starhop_core::validate_chain(&parent.board, &chain, parent.current_player as i8).is_ok(),
            "illegal hop chain {:?}",
            chain
        );

        let mut node = Self {
            parent: Some(parent_id),
            children: FxHashMap::default(),
            hop_chain: Vec::new(),
            board: parent.board.clone(),
            pieces: parent.pieces.clone(),
            win_statuses: parent.win_statuses.clone(),
            goal_slots: parent.goal_slots,
            remaining_players: parent.remaining_players,
            current_player: parent.current_player,
            agent_player: parent.agent_player,
            score: 0.0,
            best_child: None,
            pruned: false,
            expanded: false,
            depth: parent.depth + 1,
        };

        node.apply(&chain);
        node.hop_chain = chain;
        node.check_winners();
        node.advance_player();
        node
    }

    // ========================================================================
    // STATE UPDATES
    // ========================================================================

    fn apply(&mut self, chain: &[Point]) {
        let (Some(&source), Some(&dest)) = (chain.first(), chain.last()) else {
            return;
        };
        self.board.apply_chain(chain);
        let set = &mut self.pieces[self.current_player];
        set.remove(&source);
        set.insert(dest);
    }

    /// Flag newly finished players; already-won players are never rechecked
    pub(crate) fn check_winners(&mut self) {
        for (i, &slot) in self.goal_slots.iter().enumerate() {
            let player = i + 1;
            if !self.win_statuses[player] && self.board.fills_slot(slot, player as i8) {
                self.win_statuses[player] = true;
                self.remaining_players -= 1;
            }
        }
    }

    /// Rotate to the next player who has not won, wrapping N -> 1
    fn advance_player(&mut self) {
        if self.remaining_players == 0 {
            return;
        }
        let n = self.num_players();
        let mut next = self.current_player;
        loop {
            next = next % n + 1;
            if !self.win_statuses[next] {
                break;
            }
        }
        self.current_player = next;
    }

    /// Turn this node into a fresh root after re-rooting
    pub(crate) fn detach(&mut self) {
        self.parent = None;
        self.score = 0.0;
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn hop_chain(&self) -> &[Point] {
        &self.hop_chain
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child(&self, key: MoveKey) -> Option<NodeId> {
        self.children.get(&key).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = (MoveKey, NodeId)> + '_ {
        self.children.iter().map(|(&k, &id)| (k, id))
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Pieces of `player` (empty for unknown ids)
    pub fn pieces(&self, player: usize) -> impl Iterator<Item = Point> + '_ {
        self.pieces.get(player).into_iter().flat_map(|set| set.iter().copied())
    }

    pub fn has_won(&self, player: usize) -> bool {
        self.win_statuses.get(player).copied().unwrap_or(false)
    }

    pub fn num_players(&self) -> usize {
        self.win_statuses.len() - 1
    }

    pub fn remaining_players(&self) -> usize {
        self.remaining_players
    }

    pub fn current_player(&self) -> usize {
        self.current_player
    }

    pub fn agent_player(&self) -> usize {
        self.agent_player
    }

    /// Everyone has finished
    pub fn is_terminal(&self) -> bool {
        self.remaining_players == 0
    }
}
