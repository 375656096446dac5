//! Headless runner: load a config and a scenario, tick the simulation and
//! print the outcome with the final state hash.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use garrison_game::prelude::*;

/// Run a garrison match headless.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of fixed steps to simulate.
    #[arg(short, long, default_value_t = 900)]
    ticks: u64,

    /// Game rules as JSON. Missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Troop catalog overrides as JSON.
    #[arg(long)]
    troops: Option<PathBuf>,

    /// Built-in scenario to set up.
    #[arg(short, long, value_enum, default_value_t = Scenario::Skirmish)]
    scenario: Scenario,

    /// Map definition JSON; replaces the built-in scenario.
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Owner id of the human player.
    #[arg(short, long, default_value_t = 1)]
    local_owner: OwnerId,

    /// Print the final snapshot as JSON.
    #[arg(long)]
    dump: bool,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Two bases with a contested neutral barracks in the middle.
    Skirmish,
    /// Five attackers against an undefended barracks.
    Capture,
    /// A single base training a full queue.
    Production,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn setup(sim: &mut Simulation, scenario: Scenario) {
    let me = sim.local_owner();
    let enemy = me + 1;
    match scenario {
        Scenario::Skirmish => {
            let ours = sim.spawn(&SpawnParams::new(BuildingType::Barracks, -40.0, 0.0, me));
            let theirs = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 40.0, 0.0, enemy).ai(true));
            sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, NEUTRAL_OWNER_ID));
            sim.spawn(&SpawnParams::new(TroopType::Spearman, -3.0, 1.0, me));
            sim.spawn(&SpawnParams::new(TroopType::Archer, 3.0, -1.0, enemy).ai(true));
            sim.set_rally(&[ours], me, -5.0, 0.0);
            sim.set_rally(&[theirs], enemy, 5.0, 0.0);
            for troop in [TroopType::Swordsman, TroopType::Archer] {
                sim.start_production(&[ours], me, troop);
                sim.start_production(&[theirs], enemy, troop);
            }
        }
        Scenario::Capture => {
            sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, enemy).ai(true));
            for i in 0..5 {
                let angle = i as f32 * 1.25;
                sim.spawn(&SpawnParams::new(TroopType::Archer, 5.0 * angle.cos(), 5.0 * angle.sin(), me));
            }
        }
        Scenario::Production => {
            let ours = sim.spawn(&SpawnParams::new(BuildingType::Barracks, 0.0, 0.0, me));
            sim.spawn(&SpawnParams::new(BuildingType::Barracks, 200.0, 0.0, enemy).ai(true));
            for troop in [
                TroopType::Builder,
                TroopType::Healer,
                TroopType::Swordsman,
                TroopType::MountedKnight,
                TroopType::HorseArcher,
                TroopType::Archer,
            ] {
                let result = sim.start_production(&[ours], me, troop);
                tracing::info!(troop = %troop, ?result, "queued");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => GameConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => GameConfig::default(),
    };
    let troops = match &args.troops {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            TroopConfig::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => TroopConfig::new(),
    };

    let mut sim = Simulation::with_troops(config, troops, args.local_owner)?;
    let recorder = sim.bus().recorder();

    match &args.map {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let map: MapDefinition =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
            sim.load_map(&map, None);
        }
        None => setup(&mut sim, args.scenario),
    }

    for _ in 0..args.ticks {
        sim.tick();
        for event in recorder.drain() {
            tracing::debug!(tick = sim.tick_count(), kind = event.kind(), ?event, "event");
        }
    }

    let snapshot = sim.snapshot();
    if args.dump {
        println!("{}", snapshot.to_json()?);
    }
    println!("ticks:     {}", sim.tick_count());
    println!("sim time:  {:.2}s", sim.sim_time());
    println!("entities:  {}", sim.world().entity_count());
    println!("ambient:   {:?}", sim.ambient_state());
    println!(
        "outcome:   {}",
        sim.victory().outcome().map_or("undecided", VictoryOutcome::as_str)
    );
    println!("events:    {}", sim.bus().publish_count());
    println!("hash:      {}", snapshot.hash()?);
    Ok(())
}
