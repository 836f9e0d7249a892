//! Tree controller: background expansion and re-rooting
//!
//! One worker thread owns the [`SearchTree`] and consumes an ordered command
//! stream. While exploring it expands nodes breadth-first, checking for
//! commands between nodes; otherwise it blocks on the next command. Because
//! every command is handled on the worker, a re-root is fully applied before
//! any later best-move query or re-seed reads the root.
//!
//! ## Architecture
//! - Level 1: Worker loop (`run`)
//! - Level 2: Command handling
//! - Level 3: Exploration step, forced expansion

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use starhop_core::{Board, HopChain, Point};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::tree::{NodeId, RerootOutcome, SearchTree};

// ============================================================================
// COMMANDS
// ============================================================================

/// Instructions to the tree worker, processed in order
#[derive(Debug)]
pub enum Command {
    StartExploring,
    StopExploring,
    /// Any player's move was accepted by the host
    MoveCommitted { source: Point, dest: Point },
    /// Reply with the best move found so far
    BestMove { reply: Sender<Option<HopChain>> },
    /// Reply with the current root position
    Snapshot { reply: Sender<BoardSnapshot> },
    GameOver,
}

/// Current root position as seen by the worker
#[derive(Clone, Debug, PartialEq)]
pub struct BoardSnapshot {
    pub board: Board,
    pub current_player: usize,
    pub remaining_players: usize,
    pub tree_size: usize,
}

/// Worker counters, returned when the worker exits
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes popped and expanded
    pub expanded: u64,
    /// Popped ids that were pruned or already released
    pub skipped: u64,
    pub reroots: u64,
    /// Nodes discarded by re-rooting
    pub pruned: u64,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("tree worker has exited")]
    WorkerGone,

    #[error("move {from} -> {to} is not a child of the root")]
    UnknownMove { from: Point, to: Point },

    #[error("failed to spawn tree worker: {0}")]
    Spawn(#[from] std::io::Error),
}

// ============================================================================
// CONTROLLER (Level 2 - Command Handling)
// ============================================================================

/// Owns the tree and the breadth-first exploration queue
pub struct TreeController {
    tree: SearchTree,
    queue: VecDeque<NodeId>,
    exploring: bool,
    stats: SearchStats,
}

impl TreeController {
    pub fn new(tree: SearchTree) -> Self {
        Self {
            tree,
            queue: VecDeque::new(),
            exploring: false,
            stats: SearchStats::default(),
        }
    }

    pub fn tree(&self) -> &SearchTree {
        &self.tree
    }

    pub fn is_exploring(&self) -> bool {
        self.exploring
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Apply one command; `Break` means the worker should exit
    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::StartExploring => self.exploring = true,
            Command::StopExploring => {
                self.exploring = false;
                self.queue.clear();
            }
            Command::MoveCommitted { source, dest } => {
                if let Err(e) = self.commit_move(source, dest) {
                    error!("tree out of sync with the game: {}", e);
                    return ControlFlow::Break(());
                }
            }
            Command::BestMove { reply } => {
                let _ = reply.send(self.best_move());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::GameOver => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Move the root onto the committed move's child
    ///
    /// Forces one expansion of the root when the move has not been seen yet.
    pub fn commit_move(&mut self, source: Point, dest: Point) -> Result<RerootOutcome, ControllerError> {
        if self.tree.root_node().child((source, dest)).is_none() {
            let root = self.tree.root();
            self.tree.expand(root);
        }

        let outcome = self
            .tree
            .reroot(source, dest)
            .ok_or(ControllerError::UnknownMove { from: source, to: dest })?;

        self.stats.reroots += 1;
        self.stats.pruned += outcome.pruned as u64;
        debug!(
            pruned = outcome.pruned,
            elapsed_us = outcome.elapsed.as_micros() as u64,
            remaining = self.tree.len(),
            "pruned old root"
        );
        Ok(outcome)
    }

    /// Best move found so far for the side to move at the root
    ///
    /// `None` only when that side has no legal move at all.
    pub fn best_move(&mut self) -> Option<HopChain> {
        if self.tree.root_node().num_children() == 0 {
            let root = self.tree.root();
            self.tree.expand(root);
        }
        let best = self.tree.best_move();
        debug!(
            score = self.tree.root_node().score,
            tree_size = self.tree.len(),
            expanded = self.stats.expanded,
            "best move {:?}",
            best
        );
        best
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let root = self.tree.root_node();
        BoardSnapshot {
            board: root.board().clone(),
            current_player: root.current_player(),
            remaining_players: root.remaining_players(),
            tree_size: self.tree.len(),
        }
    }

    // ========================================================================
    // Level 3: Exploration
    // ========================================================================

    /// Pop and expand one node, re-seeding with the root when the queue is empty
    ///
    /// Pruned, released and finished nodes are skipped.
    pub fn step(&mut self) {
        let id = match self.queue.pop_front() {
            Some(id) => id,
            None => self.tree.root(),
        };

        match self.tree.get(id) {
            Some(node) if !node.pruned && !node.is_terminal() => {
                let children = self.tree.expand(id);
                self.queue.extend(children);
                self.stats.expanded += 1;
            }
            _ => self.stats.skipped += 1,
        }
    }

    // ========================================================================
    // Level 1: Worker Loop
    // ========================================================================

    /// Consume commands until `GameOver` or until every sender is dropped
    pub fn run(mut self, commands: Receiver<Command>) -> SearchStats {
        loop {
            let command = if self.exploring {
                match commands.try_recv() {
                    Ok(command) => command,
                    Err(TryRecvError::Empty) => {
                        self.step();
                        continue;
                    }
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                self.queue.clear();
                match commands.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                }
            };

            if self.handle(command).is_break() {
                break;
            }
        }

        info!(
            expanded = self.stats.expanded,
            skipped = self.stats.skipped,
            reroots = self.stats.reroots,
            "tree worker finished"
        );
        self.stats
    }
}

// ============================================================================
// CLIENT
// ============================================================================

/// Cloneable handle for sending commands to the worker
#[derive(Clone, Debug)]
pub struct ControllerClient {
    commands: Sender<Command>,
}

impl ControllerClient {
    fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.commands.send(command).map_err(|_| ControllerError::WorkerGone)
    }

    pub fn start_exploring(&self) -> Result<(), ControllerError> {
        self.send(Command::StartExploring)
    }

    pub fn stop_exploring(&self) -> Result<(), ControllerError> {
        self.send(Command::StopExploring)
    }

    pub fn commit_move(&self, source: Point, dest: Point) -> Result<(), ControllerError> {
        self.send(Command::MoveCommitted { source, dest })
    }

    pub fn game_over(&self) -> Result<(), ControllerError> {
        self.send(Command::GameOver)
    }

    /// Blocks until the worker answers
    pub fn best_move(&self) -> Result<Option<HopChain>, ControllerError> {
        let (reply, answer) = crossbeam_channel::bounded(1);
        self.send(Command::BestMove { reply })?;
        answer.recv().map_err(|_| ControllerError::WorkerGone)
    }

    /// Blocks until the worker answers
    pub fn snapshot(&self) -> Result<BoardSnapshot, ControllerError> {
        let (reply, answer) = crossbeam_channel::bounded(1);
        self.send(Command::Snapshot { reply })?;
        answer.recv().map_err(|_| ControllerError::WorkerGone)
    }
}

/// Start a worker thread that owns `tree`
pub fn spawn(tree: SearchTree) -> Result<(ControllerClient, JoinHandle<SearchStats>), ControllerError> {
    let (commands, receiver) = crossbeam_channel::unbounded();
    let handle = std::thread::Builder::new()
        .name("tree-worker".to_string())
        .spawn(move || TreeController::new(tree).run(receiver))?;
    Ok((ControllerClient { commands }, handle))
}
