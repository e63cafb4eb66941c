//! Integration tests for the external command queue
//!
//! These tests verify:
//! - Commands are applied at the start of the next tick, in FIFO order
//! - A full queue rejects instead of blocking
//! - Feeding, messaging, species switching and school resizing end to end

use tidepool::core::config::EngineConfig;
use tidepool::core::error::EngineError;
use tidepool::core::types::{AgentId, Rect, SchoolId, Vec2};
use tidepool::ecs::world::World;
use tidepool::entity::behavior::BehaviorState;
use tidepool::entity::species::Species;
use tidepool::simulation::events::{EngineCommand, SimulationEvent, COMMAND_QUEUE_CAPACITY};
use tidepool::simulation::exclusion::ExclusionZone;
use tidepool::simulation::sectors::StaticMonitors;

fn world() -> World {
    World::new(
        EngineConfig::default(),
        &StaticMonitors(vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)]),
    )
    .unwrap()
}

#[test]
fn test_commands_apply_in_order_next_tick() {
    let mut world = world();
    let sender = world.event_sender();

    sender.try_send(EngineCommand::ToggleSanctuary).unwrap();
    sender
        .try_send(EngineCommand::ReplaceZones(vec![ExclusionZone::new(
            "a",
            Rect::new(100.0, 100.0, 50.0, 50.0),
        )]))
        .unwrap();
    sender.try_send(EngineCommand::ClearZones).unwrap();
    sender
        .try_send(EngineCommand::ReplaceZones(vec![ExclusionZone::new(
            "b",
            Rect::new(300.0, 300.0, 50.0, 50.0),
        )]))
        .unwrap();

    // Nothing happens until the tick drains the queue
    assert!(!world.zones.is_enabled());
    world.step();

    assert!(world.zones.is_enabled());
    assert_eq!(world.zones.zones().len(), 1);
    assert_eq!(world.zones.zones()[0].label, "b");
}

#[test]
fn test_full_queue_rejects_without_blocking() {
    let world = world();
    let sender = world.event_sender();
    for _ in 0..COMMAND_QUEUE_CAPACITY {
        sender.try_send(EngineCommand::ToggleSanctuary).unwrap();
    }
    let err = sender.try_send(EngineCommand::ToggleSanctuary).unwrap_err();
    assert!(matches!(err, EngineError::QueueFull));
}

#[tokio::test]
async fn test_async_producer_feeds_the_tank() {
    let mut world = world();
    let sender = world.event_sender();
    let target = world.sectors.canvas().center();

    let producer = tokio::spawn(async move {
        sender
            .send(EngineCommand::DropPellet { position: target })
            .await
    });
    producer.await.unwrap().unwrap();

    world.step();
    assert_eq!(world.pellets.len(), 1);
}

#[test]
fn test_message_drives_communicating_state() {
    let mut world = world();
    let sender = world.event_sender();
    let primary = world.primary_agent().unwrap();

    sender
        .try_send(EngineCommand::MessagePending { agent: None })
        .unwrap();
    let events = world.step();
    assert!(events.iter().any(|e| matches!(
        e,
        SimulationEvent::StateChanged { agent, to: BehaviorState::Communicating, .. } if *agent == primary
    )));

    // Stays put until dismissed
    for _ in 0..30 {
        world.step();
    }
    let idx = world.agents.index_of(primary).unwrap();
    assert_eq!(world.agents.behaviors[idx].state(), BehaviorState::Communicating);

    sender
        .try_send(EngineCommand::MessageDismissed { agent: Some(primary) })
        .unwrap();
    world.step();
    world.step();
    let idx = world.agents.index_of(primary).unwrap();
    assert_ne!(world.agents.behaviors[idx].state(), BehaviorState::Communicating);
}

#[test]
fn test_message_for_unknown_agent_is_rejected() {
    let mut world = world();
    world
        .event_sender()
        .try_send(EngineCommand::MessagePending {
            agent: Some(AgentId::new(9999)),
        })
        .unwrap();
    let events = world.step();
    assert!(events
        .iter()
        .any(|e| matches!(e, SimulationEvent::CommandRejected { .. })));
}

#[test]
fn test_switch_species_replaces_population() {
    let mut world = world();
    let old: Vec<AgentId> = world.agents.ids.clone();

    world
        .event_sender()
        .try_send(EngineCommand::SwitchSpecies {
            species: Species::Jellyfish,
            count: 3,
        })
        .unwrap();
    let events = world.step();

    assert!(events.contains(&SimulationEvent::PopulationChanged {
        species: Species::Jellyfish,
        count: 3,
    }));
    assert_eq!(world.agent_count(), 3);
    assert!(world.agents.species.iter().all(|s| *s == Species::Jellyfish));
    assert!(world.agents.schools.iter().all(|s| s.is_none()));
    for id in old {
        assert_eq!(world.sectors.owner_count(id), 0);
        assert!(world.agents.index_of(id).is_none());
    }
}

#[test]
fn test_resize_school_grows_and_shrinks() {
    let mut world = world();
    let school = world.agents.schools[0].unwrap();
    let sender = world.event_sender();

    sender
        .try_send(EngineCommand::ResizeSchool { school, count: 10 })
        .unwrap();
    world.step();
    assert_eq!(world.agents.iter_school(school).count(), 10);

    sender
        .try_send(EngineCommand::ResizeSchool { school, count: 2 })
        .unwrap();
    world.step();
    assert_eq!(world.agents.iter_school(school).count(), 2);

    sender
        .try_send(EngineCommand::ResizeSchool {
            school: SchoolId(77),
            count: 4,
        })
        .unwrap();
    let events = world.step();
    assert!(events
        .iter()
        .any(|e| matches!(e, SimulationEvent::CommandRejected { .. })));
}

#[test]
fn test_pellet_inside_zone_is_ignored() {
    let mut config = EngineConfig::default();
    config.sanctuary.enabled = true;
    config.population.species = Species::Betta;
    config.population.count = 1;
    let mut world = World::new(config, &StaticMonitors(vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)])).unwrap();

    let zone = Rect::new(1200.0, 0.0, 400.0, 1080.0);
    world.zones.add_zone(ExclusionZone::new("shelf", zone));
    world.agents.positions[0] = Vec2::new(300.0, 500.0);
    world.drop_pellet(Vec2::new(1400.0, 500.0));

    for _ in 0..300 {
        world.step();
        assert_ne!(world.agents.behaviors[0].state(), BehaviorState::Feeding);
    }
    assert_eq!(world.pellets.len(), 1);
}
