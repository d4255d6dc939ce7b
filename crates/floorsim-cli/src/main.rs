//! Headless runner: load a scenario directory, run it, print a summary.
//!
//! Usage:
//!   floorsim --scenario <DIR> [--ticks N] [--seed S] [--event-driven]
//!            [--summary-every N]
//!
//! Logging goes through `env_logger`; `RUST_LOG=debug` shows every state
//! transition.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use floorsim_core::event::{Event, EventKind};
use floorsim_data::load_scenario;
use floorsim_engine::{ClockMode, SimulationBuilder};
use log::info;

#[derive(Parser)]
#[command(name = "floorsim")]
#[command(about = "Discrete-event manufacturing floor simulation")]
struct Cli {
    /// Directory holding catalog, orders and optional layout/engine files
    #[arg(long, default_value = "crates/floorsim-cli/scenarios/basic")]
    scenario: PathBuf,

    /// Stop after this tick instead of the catalog duration
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the backoff seed
    #[arg(long)]
    seed: Option<u64>,

    /// Jump the clock over idle stretches
    #[arg(long)]
    event_driven: bool,

    /// Log a summary every N ticks (0 disables)
    #[arg(long, default_value = "0")]
    summary_every: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let scenario = load_scenario(&cli.scenario)
        .with_context(|| format!("loading scenario {}", cli.scenario.display()))?;
    let mut config = scenario.engine;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.event_driven {
        config.clock = ClockMode::EventDriven;
    }
    let end = cli
        .ticks
        .unwrap_or(scenario.registry.starting_conditions().duration);

    let mut sim = SimulationBuilder::new(scenario.registry)
        .config(config)
        .orders(scenario.orders)
        .assignments(scenario.assignments)
        .build()
        .context("setting up the floor")?;

    let diagnostics = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&diagnostics);
    sim.on_passive(
        EventKind::Diagnostic,
        Box::new(move |event: &Event| {
            if let Event::Diagnostic { .. } = event {
                counter.set(counter.get() + 1);
            }
        }),
    );

    let mut next_summary = cli.summary_every;
    while sim.tick() < end && !sim.all_orders_complete() {
        sim.step().context("simulation step failed")?;
        if cli.summary_every > 0 && sim.tick() >= next_summary {
            info!("\n{}", sim.summary());
            next_summary = sim.tick() + cli.summary_every;
        }
    }

    if sim.all_orders_complete() {
        info!("all orders delivered at tick {}", sim.tick());
    } else {
        info!("stopped at tick {} with orders outstanding", sim.tick());
    }
    print!("{}", sim.summary());
    println!("diagnostics raised: {}", diagnostics.get());
    println!("state hash: {:016x}", sim.state_hash());
    Ok(())
}
