#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs Chronopath headless on a virtual clock.

mod report;

use std::{fs, io, path::PathBuf, thread};

use anyhow::{Context, Result};
use chronopath_system_simulation::{SimulationConfig, SimulationController};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Runs episodes of the time-rewind pathfinding simulation.
#[derive(Debug, Parser)]
#[command(name = "chronopath", version)]
struct Cli {
    /// TOML configuration file; built-in defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides the number of episodes.
    #[arg(long)]
    episodes: Option<u32>,
    /// Overrides the world seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Overrides the per-episode tick limit; 0 disables it.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Stops the whole run after this many ticks.
    #[arg(long, value_name = "TICKS")]
    tick_budget: Option<u64>,
    /// Requests a manual rewind before the given tick, e.g. `12:3`.
    #[arg(long = "rewind", value_name = "TICK:DEPTH", value_parser = parse_manual_rewind)]
    rewinds: Vec<ManualRewind>,
    /// Sleeps for every tick so the run advances in real time.
    #[arg(long)]
    realtime: bool,
}

/// Manual rewind scheduled from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ManualRewind {
    tick: u64,
    snapshots_ago: usize,
}

fn parse_manual_rewind(value: &str) -> Result<ManualRewind, String> {
    let (tick, depth) = value
        .split_once(':')
        .ok_or_else(|| format!("expected TICK:DEPTH, got `{value}`"))?;
    let tick = tick
        .trim()
        .parse()
        .map_err(|error| format!("invalid tick `{tick}`: {error}"))?;
    let snapshots_ago = depth
        .trim()
        .parse()
        .map_err(|error| format!("invalid depth `{depth}`: {error}"))?;
    Ok(ManualRewind {
        tick,
        snapshots_ago,
    })
}

fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SimulationConfig::from_toml_str(&contents)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    if let Some(episodes) = cli.episodes {
        config.run.episodes = episodes;
    }
    if let Some(seed) = cli.seed {
        config.run.seed = seed;
    }
    if let Some(max_ticks) = cli.max_ticks {
        config.run.max_ticks_per_episode = max_ticks;
    }
    config
        .validate()
        .context("configuration overrides are invalid")?;
    Ok(config)
}

/// Entry point for the Chronopath command-line interface.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let tick = config.tick();
    info!(
        width = config.grid.width,
        height = config.grid.height,
        layout = ?config.grid.layout,
        episodes = config.run.episodes,
        seed = config.run.seed,
        "starting run"
    );

    let mut controller =
        SimulationController::new(config).context("failed to build the simulation")?;
    let mut events = Vec::new();
    controller.start(&mut events);

    let mut ticks: u64 = 0;
    while !controller.is_finished() {
        if cli.tick_budget.is_some_and(|budget| ticks >= budget) {
            warn!(ticks, "tick budget exhausted, stopping run");
            controller.stop(&mut events);
            break;
        }

        for rewind in cli.rewinds.iter().filter(|rewind| rewind.tick == ticks) {
            if let Err(error) = controller.request_rewind(rewind.snapshots_ago, &mut events) {
                warn!(%error, tick = ticks, "manual rewind refused");
            }
        }

        controller
            .tick(tick, &mut events)
            .with_context(|| format!("simulation failed at tick {ticks}"))?;
        ticks += 1;

        for line in report::render(&events) {
            println!("{line}");
        }
        events.clear();

        if cli.realtime {
            thread::sleep(tick);
        }
    }

    for line in report::render(&events) {
        println!("{line}");
    }
    Ok(())
}
