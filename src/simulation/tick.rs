//! Tick system - orchestrates simulation updates
//!
//! One tick runs, in order:
//! commands -> zone schedules -> pellets -> needs -> school targets ->
//! behavior -> flocking + steering -> feeding -> sector ownership ->
//! exploration memory -> growth
//!
//! Flock forces are computed in parallel with rayon above the configured
//! population threshold; everything else runs on the calling thread so a
//! given seed always replays the same way.

use crate::core::types::{SimTime, Tick, Vec2};
use crate::ecs::world::World;
use crate::entity::behavior::{BehaviorContext, BehaviorState, TargetPlanner};
use crate::motion::SteeringInput;
use crate::simulation::events::SimulationEvent;
use crate::simulation::exploration::WorldPlanner;
use crate::simulation::growth::GrowthEvent;
use crate::simulation::pellets::PELLET_NUTRITION;

/// Run a single simulation tick and return what happened
pub fn run_simulation_tick(world: &mut World) -> Vec<SimulationEvent> {
    let mut events = Vec::new();
    let tick = world.clock.tick() + 1;
    let dt = world.clock.dt();
    let now = world.time() + dt as f64;

    for command in world.drain_commands() {
        world.apply_command(command, &mut events);
    }
    let hour = world.time_of_day();
    world.zones.refresh(hour);

    pellet_system(world, dt, now, &mut events);
    needs_system(world, dt);
    school_system(world, now);
    behavior_system(world, tick, now, &mut events);
    movement_system(world, tick, dt, now, &mut events);
    feeding_system(world, tick, &mut events);
    sector_system(world, tick, &mut events);

    for &p in &world.agents.positions {
        world.exploration.record(p, now);
    }

    let growth_events = world.growth.update(
        dt,
        now,
        &world.config.decor,
        &world.sectors,
        &mut world.rng,
    );
    events.extend(growth_events.into_iter().map(|e| match e {
        GrowthEvent::PlantTrimmed { decoration, .. } => {
            SimulationEvent::PlantTrimmed { decoration, tick }
        }
        GrowthEvent::LeafBurst { count } => SimulationEvent::LeavesEmitted { count, tick },
    }));

    world.clock.advance();
    events
}

fn pellet_system(world: &mut World, dt: f32, now: SimTime, events: &mut Vec<SimulationEvent>) {
    let b = &world.config.behavior;
    let expired = world
        .pellets
        .update(dt, now, b.pellet_sink_speed, b.pellet_lifetime);
    events.extend(
        expired
            .into_iter()
            .map(|pellet| SimulationEvent::PelletExpired { pellet }),
    );
}

fn needs_system(world: &mut World, dt: f32) {
    let a = &mut world.agents;
    let max_speed = world.config.motion.max_speed;
    for i in 0..a.count() {
        let top = a.species[i].profile().max_speed.min(max_speed);
        let exertion = if top > 0.0 { a.speeds[i] / top } else { 0.0 };
        let behavior = &a.behaviors[i];
        let resting = behavior.state() == BehaviorState::Resting;
        a.needs[i].decay(dt, exertion, resting, &world.config.behavior);
        let bonus = behavior.mood_bonus(dt);
        if bonus > 0.0 {
            a.needs[i].boost_mood(bonus);
        }
    }
}

fn school_system(world: &mut World, now: SimTime) {
    let mut planner = WorldPlanner {
        map: &world.exploration,
        sectors: &world.sectors,
        zones: &world.zones,
        rng: &mut world.rng,
        canvas: &world.config.canvas,
        behavior: &world.config.behavior,
        now,
    };
    let center = world.sectors.canvas().center();
    world
        .flock
        .update_roam_targets(&world.agents, now, &world.config.flock, || {
            planner.exploration_target(center)
        });
}

/// Nearest pellet that is not inside an active zone
fn reachable_pellet(world: &World, p: Vec2) -> Option<Vec2> {
    world
        .pellets
        .nearest(p, |q| !world.zones.is_inside_active(q))
        .map(|pellet| pellet.position)
}

fn behavior_system(world: &mut World, tick: Tick, now: SimTime, events: &mut Vec<SimulationEvent>) {
    for i in 0..world.agents.count() {
        let position = world.agents.positions[i];
        let nearest_pellet = reachable_pellet(world, position);
        let sector = world
            .sectors
            .get(world.agents.sectors[i])
            .map(|s| s.rect)
            .unwrap_or_else(|| world.sectors.canvas());
        let school_target = world.agents.schools[i].and_then(|s| world.flock.roam_target(s));

        let ctx = BehaviorContext {
            now,
            tick,
            position,
            needs: &world.agents.needs[i],
            sector,
            near_exclusion: world.zones.is_blocked(position),
            nearest_pellet,
            school_target,
            config: &world.config.behavior,
        };
        let mut planner = WorldPlanner {
            map: &world.exploration,
            sectors: &world.sectors,
            zones: &world.zones,
            rng: &mut world.rng,
            canvas: &world.config.canvas,
            behavior: &world.config.behavior,
            now,
        };

        if let Some(t) = world.agents.behaviors[i].evaluate(&ctx, &mut planner) {
            let agent = world.agents.ids[i];
            tracing::debug!(agent = agent.0, from = ?t.from, to = ?t.to, tick, "State changed");
            events.push(SimulationEvent::StateChanged {
                agent,
                from: t.from,
                to: t.to,
                tick,
            });
        }
    }
}

fn movement_system(
    world: &mut World,
    tick: Tick,
    dt: f32,
    now: SimTime,
    events: &mut Vec<SimulationEvent>,
) {
    let forces = world.flock.compute_forces(&world.agents, &world.config.flock);
    let motion = &world.config.motion;
    let strength = world.zones.strength().max(f32::EPSILON);

    for i in 0..world.agents.count() {
        let a = &world.agents;
        let position = a.positions[i];
        let profile = a.species[i].profile();
        let behavior = &a.behaviors[i];

        let sector = world
            .sectors
            .get(a.sectors[i])
            .map(|s| s.rect)
            .unwrap_or_else(|| world.sectors.canvas());
        let ctx = BehaviorContext {
            now,
            tick,
            position,
            needs: &a.needs[i],
            sector,
            near_exclusion: false,
            nearest_pellet: None,
            school_target: a.schools[i].and_then(|s| world.flock.roam_target(s)),
            config: &world.config.behavior,
        };
        let intent = behavior.intent(&ctx, &profile, a.speed_mults[i]);

        // Zone repulsion applies in every state; stationary states ignore
        // edge pressure and school mates so they hold position
        let repulsion = world.zones.repulsion(position) * (1.0 / strength);
        let (flock, boundary) = if behavior.state().is_stationary() {
            (Vec2::ZERO, Vec2::ZERO)
        } else {
            (
                forces[i].total,
                world.sectors.boundary_pressure(
                    position,
                    motion.boundary_margin,
                    motion.boundary_strength,
                ),
            )
        };

        let input = SteeringInput {
            position,
            heading: a.headings[i],
            speed: a.speeds[i],
            target: intent.target,
            desired_speed: intent.desired_speed,
            bias: flock + repulsion + boundary,
            max_speed: profile.max_speed.min(motion.max_speed),
            turn_cap: motion.turn_rate_cap * profile.turn_scale,
            wobble: a.noise[i].signal(now, motion.wobble_frequency) * motion.wobble_amplitude,
            dt,
        };
        let out = world.steering.steer(&input);

        let moved = world.sectors.clamp_to_canvas(position + out.velocity * dt);
        let committed = world
            .zones
            .eject(moved, |p| world.sectors.clamp_to_canvas(p))
            .unwrap_or(position);

        let a = &mut world.agents;
        if committed.is_finite() && out.heading.is_finite() && out.speed.is_finite() {
            a.positions[i] = committed;
            a.headings[i] = out.heading;
            a.speeds[i] = out.speed;
            a.velocities[i] = out.velocity;
        } else {
            let agent = a.ids[i];
            tracing::warn!(agent = agent.0, tick, "Non-finite pose computed, keeping previous pose");
            a.speeds[i] = 0.0;
            a.velocities[i] = Vec2::ZERO;
            events.push(SimulationEvent::PoseReverted { agent, tick });
        }
    }
}

fn feeding_system(world: &mut World, tick: Tick, events: &mut Vec<SimulationEvent>) {
    let radius = world.config.behavior.eat_radius;
    for i in 0..world.agents.count() {
        if world.agents.behaviors[i].state() != BehaviorState::Feeding {
            continue;
        }
        let zones = &world.zones;
        let eaten = world
            .pellets
            .consume_near(world.agents.positions[i], radius, |q| !zones.is_inside_active(q));
        if let Some(pellet) = eaten {
            world.agents.needs[i].feed(PELLET_NUTRITION);
            events.push(SimulationEvent::PelletConsumed {
                agent: world.agents.ids[i],
                pellet: pellet.id,
                tick,
            });
        }
    }
}

fn sector_system(world: &mut World, tick: Tick, events: &mut Vec<SimulationEvent>) {
    let a = &mut world.agents;
    for i in 0..a.count() {
        if let Some(h) = world.sectors.update_owner(a.ids[i], a.sectors[i], a.positions[i]) {
            tracing::debug!(agent = h.agent.0, from = h.from.0, to = h.to.0, "Sector handoff");
            a.sectors[i] = h.to;
            events.push(SimulationEvent::SectorHandoff {
                agent: h.agent,
                from: h.from,
                to: h.to,
                tick,
            });
        }
    }
    let agents = &world.agents;
    world.sectors.refresh_visibility(
        agents
            .ids
            .iter()
            .copied()
            .zip(agents.positions.iter().copied()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::types::Rect;
    use crate::simulation::exclusion::ExclusionZone;
    use crate::simulation::sectors::StaticMonitors;

    fn world() -> World {
        World::new(
            EngineConfig::default(),
            &StaticMonitors(vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)]),
        )
        .unwrap()
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut world = world();
        run_simulation_tick(&mut world);
        run_simulation_tick(&mut world);
        assert_eq!(world.current_tick(), 2);
    }

    #[test]
    fn test_agents_move_over_time() {
        let mut world = world();
        let before = world.agents.positions.clone();
        for _ in 0..300 {
            run_simulation_tick(&mut world);
        }
        let moved = before
            .iter()
            .zip(&world.agents.positions)
            .any(|(a, b)| a.distance(b) > 1.0);
        assert!(moved);
    }

    #[test]
    fn test_state_change_events_carry_tick() {
        let mut world = world();
        let mut seen = 0;
        for _ in 0..600 {
            let expected = world.current_tick() + 1;
            for event in run_simulation_tick(&mut world) {
                if let SimulationEvent::StateChanged { tick, .. } = event {
                    assert_eq!(tick, expected);
                    seen += 1;
                }
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn test_pellet_inside_zone_is_not_eaten_from_its_edge() {
        let mut config = EngineConfig::default();
        config.population.species = crate::entity::species::Species::Betta;
        config.population.count = 1;
        config.sanctuary.enabled = true;
        let mut world = World::new(
            config,
            &StaticMonitors(vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)]),
        )
        .unwrap();
        world
            .zones
            .add_zone(ExclusionZone::new("shelf", Rect::new(1000.0, 400.0, 200.0, 200.0)));

        // Feeding toward a far pellet, right next to one behind the zone edge
        world.agents.positions[0] = Vec2::new(995.0, 500.0);
        world.drop_pellet(Vec2::new(300.0, 900.0));
        world.drop_pellet(Vec2::new(1005.0, 500.0));

        let events = run_simulation_tick(&mut world);
        assert_eq!(world.agents.behaviors[0].state(), BehaviorState::Feeding);
        assert!(!events
            .iter()
            .any(|e| matches!(e, SimulationEvent::PelletConsumed { .. })));
        assert_eq!(world.pellets.len(), 2);
    }

    #[test]
    fn test_pellet_gets_eaten() {
        let mut world = world();
        let target = world.agents.positions[0] + Vec2::new(30.0, 0.0);
        world.drop_pellet(target);

        let mut eaten = false;
        for _ in 0..900 {
            for event in run_simulation_tick(&mut world) {
                if matches!(event, SimulationEvent::PelletConsumed { .. }) {
                    eaten = true;
                }
            }
            if eaten {
                break;
            }
        }
        assert!(eaten);
        assert!(world.pellets.is_empty());
    }
}
