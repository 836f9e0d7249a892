//! STARHOP Search - game-tree search for Chinese-checkers agents
//!
//! This crate provides the agent's decision engine:
//! - Search nodes (future game states with max-backpropagated scores)
//! - Arena search tree (expand, reroot, prune)
//! - Position evaluators (random, distance)
//! - Tree controller (background worker driven by a command stream)

pub mod controller;
pub mod eval;
pub mod node;
pub mod tree;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use controller::{spawn, BoardSnapshot, Command, ControllerClient, ControllerError, SearchStats, TreeController};
pub use eval::{DistanceEvaluator, Evaluator, EvaluatorKind, RandomEvaluator};
pub use node::{MoveKey, SearchNode};
pub use tree::{NodeId, RerootOutcome, SearchTree};

/// Search configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Position evaluator used to score every node
    pub evaluator: EvaluatorKind,
    /// How long the tree explores before a move is chosen
    pub decision_window_ms: u64,
    /// Seed for the random evaluator; entropy when unset
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorKind::Distance,
            decision_window_ms: 3000,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn with_evaluator(mut self, evaluator: EvaluatorKind) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_window_ms(mut self, decision_window_ms: u64) -> Self {
        self.decision_window_ms = decision_window_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn decision_window(&self) -> Duration {
        Duration::from_millis(self.decision_window_ms)
    }

    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading search config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing search config {}", path.display()))?;
        Ok(config)
    }
}
