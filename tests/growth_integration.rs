//! Integration tests for decorations and leaf particles driven by the world tick

use tidepool::core::config::EngineConfig;
use tidepool::core::types::Rect;
use tidepool::ecs::world::World;
use tidepool::simulation::events::{EngineCommand, SimulationEvent};
use tidepool::simulation::sectors::StaticMonitors;

fn world_with(config: EngineConfig) -> World {
    World::new(config, &StaticMonitors(vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)])).unwrap()
}

#[test]
fn test_leaf_bursts_over_ten_minutes() {
    let mut config = EngineConfig::default();
    config.population.count = 1;
    config.decor.leaf_enabled = true;
    config.decor.leaf_cycle_seconds = 60.0;
    config.decor.leaf_burst_min = 1;
    config.decor.leaf_burst_max = 3;
    config.decor.max_live_leaves = 500;
    let mut world = world_with(config);

    let ticks = (600.0 / world.clock.dt() as f64).round() as u64;
    let mut bursts = 0;
    for _ in 0..ticks {
        for event in world.step() {
            if let SimulationEvent::LeavesEmitted { count, .. } = event {
                assert!((1..=3).contains(&count));
                bursts += 1;
            }
        }
    }

    let total = world.growth.total_spawned();
    assert_eq!(bursts, 10);
    assert!((10..=30).contains(&total), "spawned {} leaves", total);
}

#[test]
fn test_leaves_respect_toggle_and_cap() {
    let mut config = EngineConfig::default();
    config.population.count = 1;
    config.decor.leaf_enabled = true;
    config.decor.leaf_cycle_seconds = 1.0;
    config.decor.leaf_burst_min = 5;
    config.decor.leaf_burst_max = 5;
    config.decor.max_live_leaves = 8;
    config.decor.leaf_lifetime = 600.0;
    config.decor.leaf_fall_speed = 1.0;
    let mut world = world_with(config);

    for _ in 0..300 {
        world.step();
        assert!(world.growth.leaves().len() <= 8);
    }
    assert!(!world.growth.leaves().is_empty());

    world
        .event_sender()
        .try_send(EngineCommand::SetLeafEnabled(false))
        .unwrap();
    world.step();
    let spawned = world.growth.total_spawned();
    for _ in 0..300 {
        world.step();
    }
    assert_eq!(world.growth.total_spawned(), spawned);
}

#[test]
fn test_plants_trim_to_floor_in_snapshots() {
    let mut config = EngineConfig::default();
    config.population.count = 1;
    config.decor.plant_cycle_hours = 0.005;
    config.decor.plants_per_sector = 4;
    let floor = config.decor.plant_trim_floor;
    let mut world = world_with(config);

    let mut previous: Vec<f32> = world.snapshot().decorations.iter().map(|d| d.growth).collect();
    let mut trims = 0;
    for _ in 0..2400 {
        let events = world.step();
        let snapshot = world.snapshot();
        for (i, decoration) in snapshot.decorations.iter().enumerate() {
            assert!((0.0..=1.0).contains(&decoration.growth));
            let trimmed = events.iter().any(|e| {
                matches!(e, SimulationEvent::PlantTrimmed { decoration: d, .. } if *d == decoration.id)
            });
            if trimmed {
                assert!((decoration.growth - floor).abs() < 1e-4);
                trims += 1;
            } else {
                assert!(decoration.growth >= previous[i] - 1e-6);
            }
            previous[i] = decoration.growth;
        }
    }
    assert!(trims >= 4);
}
