//! Spawn command - connect several search agents to one host
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: join_agents(), play_all()
//! - Level 3: per-agent seeding
//! - Level 4: (shared with the agent command)

use anyhow::{Context, Result};
use clap::Args;
use tokio::task::JoinSet;

use starhop_net::{Agent, GameSummary};
use starhop_search::SearchConfig;

use crate::agent::{build_search_config, format_summary, SearchArgs};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SpawnArgs {
    /// Number of agents to connect
    #[arg(long, default_value = "5")]
    pub count: usize,

    #[command(flatten)]
    pub search: SearchArgs,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run spawn command
///
/// This function reads like a table of contents:
/// 1. Build the shared search config
/// 2. Join every agent in order
/// 3. Play until the game ends and report each agent
pub fn run(args: SpawnArgs) -> Result<()> {
    if args.count == 0 {
        anyhow::bail!("--count must be at least 1");
    }
    let config = build_search_config(&args.search)?;
    let runtime = tokio::runtime::Runtime::new()?;

    let summaries = runtime.block_on(async {
        let agents = join_agents(&args, &config).await?;
        play_all(agents).await
    })?;

    for summary in &summaries {
        println!("{}", format_summary(summary));
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Connect agents one at a time so ids follow spawn order
async fn join_agents(args: &SpawnArgs, config: &SearchConfig) -> Result<Vec<Agent>> {
    let addr = format!("{}:{}", args.search.host, args.search.port);
    let mut agents = Vec::with_capacity(args.count);
    for index in 0..args.count {
        let config = agent_config(config, index);
        tracing::info!("spawning agent {} ({} evaluator)", index + 1, config.evaluator);
        let agent = Agent::connect(addr.as_str(), config)
            .await
            .with_context(|| format!("connecting agent {} to {}", index + 1, addr))?;
        agents.push(agent);
    }
    Ok(agents)
}

async fn play_all(agents: Vec<Agent>) -> Result<Vec<GameSummary>> {
    let mut games = JoinSet::new();
    for agent in agents {
        games.spawn(agent.play());
    }

    let mut summaries = Vec::new();
    while let Some(result) = games.join_next().await {
        summaries.push(result??);
    }
    summaries.sort_by_key(|s| s.player_id);
    Ok(summaries)
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Give each agent its own random stream when a seed is set
fn agent_config(base: &SearchConfig, index: usize) -> SearchConfig {
    match base.seed {
        Some(seed) => base.clone().with_seed(seed.wrapping_add(index as u64)),
        None => base.clone(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_seeds_differ() {
        let base = SearchConfig::default().with_seed(10);
        assert_eq!(agent_config(&base, 0).seed, Some(10));
        assert_eq!(agent_config(&base, 3).seed, Some(13));
    }

    #[test]
    fn test_unseeded_stays_unseeded() {
        let base = SearchConfig::default();
        assert_eq!(agent_config(&base, 2), base);
    }
}
