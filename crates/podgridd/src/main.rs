//! podgridd — the PodGrid simulation daemon.
//!
//! Single binary that assembles the PodGrid subsystems:
//! - State store (redb)
//! - Heartbeat monitor
//! - Autoscaler
//! - Scheduler
//!
//! # Usage
//!
//! ```text
//! podgridd run --scenario cluster.toml --ticks 120 --events events.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use podgridd::{ScenarioConfig, SimDriver};

#[derive(Parser)]
#[command(name = "podgridd", about = "PodGrid simulation daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario to completion.
    Run {
        /// Scenario file (TOML).
        #[arg(long)]
        scenario: PathBuf,

        /// Override the scenario's tick count.
        #[arg(long)]
        ticks: Option<u64>,

        /// Override the scenario's simulated seconds per tick.
        #[arg(long)]
        tick_secs: Option<u64>,

        /// Write the event log as JSON to this path.
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,podgridd=debug,podgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scenario,
            ticks,
            tick_secs,
            events,
        } => run_scenario(scenario, ticks, tick_secs, events).await,
    }
}

async fn run_scenario(
    scenario: PathBuf,
    ticks_override: Option<u64>,
    tick_secs_override: Option<u64>,
    events_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = ScenarioConfig::from_file(&scenario)?;
    if let Some(tick_secs) = tick_secs_override {
        config.simulation.tick_secs = tick_secs;
    }
    let ticks = ticks_override.unwrap_or(config.simulation.ticks);
    info!(scenario = %scenario.display(), ticks, "starting simulation");

    let mut driver = SimDriver::new(&config)?;
    driver.run(ticks).await?;

    let report = driver.report()?;
    info!(
        ticks = report.ticks,
        nodes_ready = report.nodes_ready,
        nodes_not_ready = report.nodes_not_ready,
        pods_running = report.pods_running,
        pods_pending = report.pods_pending,
        events = report.events,
        "simulation complete"
    );

    // The state must still add up after everything the run did to it.
    driver.state().verify_allocations()?;

    if let Some(path) = events_path {
        let json = serde_json::to_string_pretty(&driver.events().snapshot())?;
        std::fs::write(&path, json)?;
        info!(path = %path.display(), "event log written");
    }

    Ok(())
}
