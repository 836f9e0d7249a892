//! STARHOP CLI - Command-line interface
//!
//! Commands:
//! - serve: Host one game
//! - agent: Connect a search agent to a host
//! - spawn: Connect several search agents at once

mod agent;
mod serve;
mod spawn;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "starhop")]
#[command(about = "STARHOP Chinese-checkers host and search agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a game
    Serve(serve::ServeArgs),
    /// Play as one search agent
    Agent(agent::AgentArgs),
    /// Play as several search agents
    Spawn(spawn::SpawnArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve::run(args),
        Commands::Agent(args) => agent::run(args),
        Commands::Spawn(args) => spawn::run(args),
    }
}
