//! Serve command - host one game
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_host(), start_host()
//! - Level 3: (delegated to starhop-net crate)
//! - Level 4: configuration validation, report formatting

use anyhow::Result;
use clap::Args;

use starhop_net::{run_host, GameReport, HostConfig, DEFAULT_PORT};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct ServeArgs {
    /// Port number to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Start once this many players have joined (2, 3, 4 or 6)
    #[arg(long, default_value = "2")]
    pub players: usize,

    /// Seed for choosing the starting player
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pause between moves in milliseconds
    #[arg(long, default_value = "500")]
    pub move_delay_ms: u64,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run serve command
///
/// This function reads like a table of contents:
/// 1. Configure host
/// 2. Host the game (blocking)
/// 3. Report the result
pub fn run(args: ServeArgs) -> Result<()> {
    let config = configure_host(&args)?;

    tracing::info!(
        "Hosting a {} player STARHOP game on port {}",
        config.players,
        config.port
    );

    let report = start_host(config)?;
    println!("{}", format_report(&report));
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Configure host from command arguments
fn configure_host(args: &ServeArgs) -> Result<HostConfig> {
    let config = HostConfig {
        port: args.port,
        players: args.players,
        seed: args.seed,
        move_delay_ms: args.move_delay_ms,
    };
    config.validate()?;
    Ok(config)
}

/// Host the game (blocking)
fn start_host(config: HostConfig) -> Result<GameReport> {
    // Create tokio runtime for async host
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async { run_host(config).await })
}

// ============================================================================
// LEVEL 4 - FORMATTING
// ============================================================================

fn format_report(report: &GameReport) -> String {
    let order: Vec<String> = report.finish_order.iter().map(|p| p.to_string()).collect();
    format!(
        "{} player game over after {} moves (player {} started); finish order: {}",
        report.num_players,
        report.moves.len(),
        report.starting_player,
        order.join(", ")
    )
}

// ============================================================================
// TESTS
// ============================================================================
