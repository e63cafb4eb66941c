//! Tidepool - headless driver
//!
//! Builds a world from a config file and a monitor layout, runs it for a
//! while, and prints what happened. The desktop overlay links the library
//! directly; this binary is for tuning and for watching the engine without
//! a renderer.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use tidepool::core::config::EngineConfig;
use tidepool::core::error::Result;
use tidepool::core::types::Vec2;
use tidepool::ecs::world::World;
use tidepool::entity::species::Species;
use tidepool::simulation::events::{EngineCommand, EventSender, SimulationEvent};
use tidepool::simulation::sectors::StaticMonitors;
use tokio::runtime::Runtime;

/// Run the aquarium engine without a renderer
#[derive(Parser, Debug)]
#[command(name = "tidepool")]
#[command(about = "Run the aquarium behavior engine headless and report what the fish did")]
struct Args {
    /// TOML config file; missing keys take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Monitor layout as comma-separated WxH+X+Y geometries
    #[arg(long, default_value = "1920x1080+0+0")]
    monitors: StaticMonitors,

    /// Species to populate the tank with (overrides config)
    #[arg(long)]
    species: Option<Species>,

    /// Number of creatures (overrides config)
    #[arg(long)]
    count: Option<u32>,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,

    /// Random seed (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    format: String,

    /// Pace ticks against the wall clock instead of running flat out
    #[arg(long)]
    realtime: bool,

    /// Drop a food pellet at the canvas center every N simulated seconds
    #[arg(long)]
    feed_every: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tidepool=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(species) = args.species {
        config.population.species = species;
    }
    if let Some(count) = args.count {
        config.population.count = count;
    }

    let mut world = World::new(config, &args.monitors)?;
    tracing::info!(
        seed = world.config.seed,
        tick_rate = world.config.tick_rate_hz,
        "Tidepool starting"
    );

    let events = if args.realtime {
        let rt = Runtime::new()?;
        rt.block_on(run_realtime(&mut world, args.seconds, args.feed_every))
    } else {
        run_headless(&mut world, args.seconds, args.feed_every)
    };

    match args.format.as_str() {
        "json" => println!("{}", world.snapshot().to_json()?),
        _ => print_summary(&world, &events),
    }
    Ok(())
}

fn canvas_center(world: &World) -> Vec2 {
    world.sectors.canvas().center()
}

/// Run ticks back to back
fn run_headless(world: &mut World, seconds: f64, feed_every: Option<f64>) -> Vec<SimulationEvent> {
    let sender = world.event_sender();
    let dt = world.clock.dt() as f64;
    let ticks = (seconds / dt).round().max(0.0) as u64;
    let feed_ticks = feed_every.map(|s| ((s / dt).round() as u64).max(1));

    let start = Instant::now();
    let mut events = Vec::new();
    for tick in 0..ticks {
        if feed_ticks.is_some_and(|n| tick > 0 && tick % n == 0) {
            feed(&sender, canvas_center(world));
        }
        events.extend(world.step());
    }
    tracing::info!(ticks, elapsed = ?start.elapsed(), "Headless run finished");
    events
}

/// Pace the world against the wall clock, with feeding done from a separate task
async fn run_realtime(world: &mut World, seconds: f64, feed_every: Option<f64>) -> Vec<SimulationEvent> {
    let frame = Duration::from_secs_f64(world.clock.dt() as f64);

    let feeder = feed_every.map(|every| {
        let sender = world.event_sender();
        let center = canvas_center(world);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(every.max(0.1)));
            interval.tick().await;
            loop {
                interval.tick().await;
                if sender
                    .send(EngineCommand::DropPellet { position: center })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        })
    });

    let mut interval = tokio::time::interval(frame);
    let mut last = Instant::now();
    let mut events = Vec::new();
    while world.time() < seconds {
        interval.tick().await;
        let now = Instant::now();
        events.extend(world.advance(now.duration_since(last).as_secs_f64()));
        last = now;
    }

    if let Some(handle) = feeder {
        handle.abort();
    }
    events
}

fn feed(sender: &EventSender, position: Vec2) {
    if let Err(e) = sender.try_send(EngineCommand::DropPellet { position }) {
        tracing::warn!(error = %e, "Could not queue pellet");
    }
}

fn event_name(event: &SimulationEvent) -> &'static str {
    match event {
        SimulationEvent::StateChanged { .. } => "state_changed",
        SimulationEvent::SectorHandoff { .. } => "sector_handoff",
        SimulationEvent::PelletConsumed { .. } => "pellet_consumed",
        SimulationEvent::PelletExpired { .. } => "pellet_expired",
        SimulationEvent::PlantTrimmed { .. } => "plant_trimmed",
        SimulationEvent::LeavesEmitted { .. } => "leaves_emitted",
        SimulationEvent::TopologyRebuilt { .. } => "topology_rebuilt",
        SimulationEvent::PopulationChanged { .. } => "population_changed",
        SimulationEvent::PoseReverted { .. } => "pose_reverted",
        SimulationEvent::CommandRejected { .. } => "command_rejected",
    }
}

fn print_summary(world: &World, events: &[SimulationEvent]) {
    println!("\n=== TIDEPOOL ===");
    println!("Tick {} ({:.1}s simulated)", world.current_tick(), world.time());
    println!(
        "Sectors: {}{}",
        world.sectors.sectors().len(),
        if world.sectors.is_fallback() { " (fallback canvas)" } else { "" }
    );
    println!("Exploration coverage: {:.0}%", world.exploration.coverage() * 100.0);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        *counts.entry(event_name(event)).or_default() += 1;
    }
    println!("\nEvents:");
    for (name, count) in &counts {
        println!("  {:<20} {}", name, count);
    }

    println!("\nCreatures:");
    let a = &world.agents;
    for i in 0..a.count() {
        println!(
            "  #{:<3} {:<22} {:<16?} ({:>7.1}, {:>7.1}) speed {:>5.1} hunger {:.2} fatigue {:.2}",
            a.ids[i].0,
            a.species[i].name(),
            a.behaviors[i].state(),
            a.positions[i].x,
            a.positions[i].y,
            a.speeds[i],
            a.needs[i].hunger,
            a.needs[i].fatigue,
        );
    }
}
