//! Agent command - play one game as a search agent
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: build_search_config(), play_game()
//! - Level 3: (delegated to starhop-net crate)
//! - Level 4: summary formatting

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use starhop_net::{Agent, GameSummary, DEFAULT_PORT};
use starhop_search::{EvaluatorKind, SearchConfig};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

/// Search options shared by `agent` and `spawn`
#[derive(Args, Clone, Debug)]
pub struct SearchArgs {
    /// Host address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Host port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// JSON search config; flags below override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Position evaluator (random or distance)
    #[arg(long)]
    pub evaluator: Option<EvaluatorKind>,

    /// Exploration time per move in milliseconds
    #[arg(long)]
    pub window_ms: Option<u64>,

    /// Seed for the random evaluator
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct AgentArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Ask the host to start immediately when assigned player 1
    #[arg(long)]
    pub ready: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run agent command
///
/// This function reads like a table of contents:
/// 1. Build the search config
/// 2. Connect and play one game
/// 3. Report the summary
pub fn run(args: AgentArgs) -> Result<()> {
    let config = build_search_config(&args.search)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(play_game(&args.search, config, args.ready))?;
    println!("{}", format_summary(&summary));
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Defaults, then the config file, then individual flags
pub fn build_search_config(args: &SearchArgs) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };
    if let Some(evaluator) = args.evaluator {
        config = config.with_evaluator(evaluator);
    }
    if let Some(window_ms) = args.window_ms {
        config = config.with_window_ms(window_ms);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

async fn play_game(args: &SearchArgs, config: SearchConfig, ready: bool) -> Result<GameSummary> {
    let addr = format!("{}:{}", args.host, args.port);
    let mut agent = Agent::connect(addr.as_str(), config)
        .await
        .with_context(|| format!("joining game at {}", addr))?;

    if ready && agent.player_id() == 1 {
        agent.ready().await?;
    }

    let player = agent.player_id();
    agent
        .play()
        .await
        .with_context(|| format!("playing as player {}", player))
}

// ============================================================================
// LEVEL 4 - FORMATTING
// ============================================================================

pub fn format_summary(summary: &GameSummary) -> String {
    format!(
        "player {}: {} moves made, {} moves seen, {} nodes expanded, {} pruned",
        summary.player_id,
        summary.moves_made,
        summary.moves_seen,
        summary.stats.expanded,
        summary.stats.pruned
    )
}

// ============================================================================
// TESTS
// ============================================================================
