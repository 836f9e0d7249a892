//! Example to run a STARHOP game host standalone
//!
//! Run with: cargo run -p starhop-net --example run_host

use starhop_net::{run_host, HostConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = HostConfig {
        players: 3,
        ..HostConfig::default()
    };

    println!("Hosting a {} player game on port {}", config.players, config.port);
    println!("Connect agents with: starhop agent --port {}", config.port);

    let report = run_host(config).await?;
    println!("Game finished after {} moves", report.moves.len());
    println!("Finish order: {:?}", report.finish_order);
    Ok(())
}
