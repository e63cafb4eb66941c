//! The simulation context: every subsystem plus the agents they act on

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::{AgentId, Rect, SchoolId, SimTime, Tick, Vec2};
use crate::entity::agents::{AgentArchetype, AgentSpawn};
use crate::entity::behavior::{BehaviorMachine, TargetPlanner};
use crate::entity::species::Species;
use crate::motion::{NoiseSource, SteeringEngine};
use crate::simulation::clock::SimulationClock;
use crate::simulation::events::{
    CommandQueue, EngineCommand, EventSender, SimulationEvent, COMMAND_QUEUE_CAPACITY,
};
use crate::simulation::exclusion::ExclusionZoneField;
use crate::simulation::exploration::{ExplorationMap, WorldPlanner};
use crate::simulation::flocking::FlockCoordinator;
use crate::simulation::growth::GrowthSimulator;
use crate::simulation::pellets::PelletField;
use crate::simulation::sectors::{MonitorProvider, SectorManager};
use crate::simulation::snapshot::{AgentPose, DecorationView, PelletView, SectorView, WorldSnapshot};
use crate::simulation::tick::run_simulation_tick;

/// Spawned school mates are scattered this far around the school center (px)
const SCHOOL_SPREAD: f32 = 60.0;

/// Hour of day the simulation starts at unless told otherwise
const DEFAULT_START_HOUR: f64 = 12.0;

/// The aquarium: agents, schools, sectors, zones and decorations
pub struct World {
    pub config: EngineConfig,
    pub clock: SimulationClock,
    pub agents: AgentArchetype,
    pub flock: FlockCoordinator,
    pub sectors: SectorManager,
    pub zones: ExclusionZoneField,
    pub growth: GrowthSimulator,
    pub pellets: PelletField,
    pub exploration: ExplorationMap,
    pub steering: SteeringEngine,
    pub rng: ChaCha8Rng,
    commands: CommandQueue,
    next_agent_id: u32,
    start_hour: f64,
}

impl World {
    /// Build a world from a config and the current monitor layout
    ///
    /// The config is sanitized first. Monitor query failures fall back to
    /// `canvas.fallback`; only a fallback without area is an error.
    pub fn new(config: EngineConfig, provider: &dyn MonitorProvider) -> Result<Self> {
        let config = config.sanitized();
        let sectors = SectorManager::from_provider(
            provider,
            config.canvas.fallback,
            config.render.sector_padding,
        )?;
        let zones = ExclusionZoneField::new(&config.sanctuary, &sectors.rects());
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let growth = GrowthSimulator::new(&config.decor, &sectors, config.seed, &mut rng);
        let exploration = ExplorationMap::new(sectors.canvas(), config.canvas.exploration_cell_size);

        let mut world = Self {
            clock: SimulationClock::new(config.tick_rate_hz, config.max_catch_up_ticks),
            agents: AgentArchetype::new(),
            flock: FlockCoordinator::new(&config.flock),
            steering: SteeringEngine::from_config(&config.motion),
            sectors,
            zones,
            growth,
            pellets: PelletField::new(),
            exploration,
            rng,
            commands: CommandQueue::new(COMMAND_QUEUE_CAPACITY),
            next_agent_id: 0,
            start_hour: DEFAULT_START_HOUR,
            config,
        };

        let species = world.config.population.species;
        let count = world.config.population.count;
        world.populate(species, count);

        tracing::info!(
            sectors = world.sectors.sectors().len(),
            agents = world.agents.count(),
            species = species.name(),
            "World created"
        );
        Ok(world)
    }

    /// Handle for producers outside the tick
    pub fn event_sender(&self) -> EventSender {
        self.commands.sender()
    }

    pub(crate) fn drain_commands(&mut self) -> Vec<EngineCommand> {
        self.commands.drain()
    }

    pub fn current_tick(&self) -> Tick {
        self.clock.tick()
    }

    /// Simulated seconds since start
    pub fn time(&self) -> SimTime {
        self.clock.elapsed()
    }

    /// Set the wall-clock hour the simulation started at (for zone schedules)
    pub fn set_start_hour(&mut self, hour: f64) {
        if hour.is_finite() {
            self.start_hour = hour.rem_euclid(24.0);
        }
    }

    /// Hour of day in [0, 24) used by zone schedules
    pub fn time_of_day(&self) -> f64 {
        (self.start_hour + self.time() / 3600.0).rem_euclid(24.0)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.count()
    }

    /// Lowest-id agent, the addressee of unaddressed messages
    pub fn primary_agent(&self) -> Option<AgentId> {
        self.agents.ids.iter().min().copied()
    }

    /// Run as many fixed ticks as `real_elapsed` seconds allow
    pub fn advance(&mut self, real_elapsed: f64) -> Vec<SimulationEvent> {
        let steps = self.clock.accumulate(real_elapsed);
        let mut events = Vec::new();
        for _ in 0..steps {
            events.extend(run_simulation_tick(self));
        }
        events
    }

    /// Run exactly one tick
    pub fn step(&mut self) -> Vec<SimulationEvent> {
        run_simulation_tick(self)
    }

    fn planner(&mut self, now: SimTime) -> WorldPlanner<'_> {
        WorldPlanner {
            map: &self.exploration,
            sectors: &self.sectors,
            zones: &self.zones,
            rng: &mut self.rng,
            canvas: &self.config.canvas,
            behavior: &self.config.behavior,
            now,
        }
    }

    /// Clamp into the canvas and out of active zones
    fn legalize(&self, p: Vec2, fallback: Vec2) -> Vec2 {
        let clamped = self.sectors.clamp_to_canvas(p);
        self.zones
            .eject(clamped, |q| self.sectors.clamp_to_canvas(q))
            .unwrap_or(fallback)
    }

    fn spawn_agent(&mut self, species: Species, position: Vec2, school: Option<SchoolId>) -> AgentId {
        let id = AgentId::new(self.next_agent_id);
        self.next_agent_id += 1;

        let now = self.time();
        let dwell = self.planner(now).dwell();
        let heading = self.rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        let speed_mult = self.rng.gen_range(0.85..=1.15);
        let sector = self.sectors.locate(position);

        self.agents.spawn(AgentSpawn {
            id,
            species,
            position,
            heading,
            school,
            sector,
            behavior: BehaviorMachine::new(now, now + dwell as f64),
            noise: NoiseSource::for_entity(self.config.seed, id.0),
            speed_mult,
        });
        self.sectors.assign(id, sector);
        id
    }

    fn despawn_agent(&mut self, id: AgentId) {
        if let Some(idx) = self.agents.index_of(id) {
            self.sectors.release(id, self.agents.sectors[idx]);
            self.agents.remove(id);
        }
    }

    fn scatter_around(&mut self, center: Vec2, radius: f32) -> Vec2 {
        let offset = Vec2::new(
            self.rng.gen_range(-radius..=radius),
            self.rng.gen_range(-radius..=radius),
        );
        self.legalize(center + offset, center)
    }

    /// Replace the whole population
    ///
    /// Schooling species form one school of `count` (clamped to the maximum
    /// school size); other species spawn `count` solo agents.
    pub fn populate(&mut self, species: Species, count: u32) {
        let ids = self.agents.ids.clone();
        for id in ids {
            self.despawn_agent(id);
        }
        self.flock.clear();

        let count = count.clamp(1, self.config.population.max_school_size);
        let now = self.time();
        let start = self.sectors.canvas().center();

        if species.profile().schooling {
            let center = self.planner(now).exploration_target(start);
            let center = self.legalize(center, center);
            let roam = self.planner(now).exploration_target(center);
            let retarget_at = now + self.config.flock.school_retarget_seconds as f64;
            let school = self.flock.create_school(species, roam, retarget_at);
            for _ in 0..count {
                let p = self.scatter_around(center, SCHOOL_SPREAD);
                self.spawn_agent(species, p, Some(school));
            }
        } else {
            for _ in 0..count {
                let p = self.planner(now).exploration_target(start);
                let p = self.legalize(p, p);
                self.spawn_agent(species, p, None);
            }
        }
        self.config.population.species = species;
        self.config.population.count = count;
    }

    /// Switch to a different species, recreating the population
    pub fn switch_species(&mut self, species: Species, count: u32) -> usize {
        self.populate(species, count);
        tracing::info!(species = species.name(), count = self.agents.count(), "Switched species");
        self.agents.count()
    }

    /// Grow or shrink a school, returning its new size
    ///
    /// New members appear near the school's centroid; the newest members
    /// leave first.
    pub fn set_school_size(&mut self, school: SchoolId, count: u32) -> Result<usize> {
        let info = self
            .flock
            .school(school)
            .cloned()
            .ok_or(EngineError::SchoolNotFound(school))?;
        let target = count.clamp(1, self.config.population.max_school_size) as usize;

        let mut members: Vec<AgentId> = self
            .agents
            .iter_school(school)
            .map(|i| self.agents.ids[i])
            .collect();
        members.sort();

        if members.len() > target {
            for id in members.split_off(target) {
                self.despawn_agent(id);
            }
        } else if members.len() < target {
            let centroid = if members.is_empty() {
                info.roam_target
            } else {
                let sum = self
                    .agents
                    .iter_school(school)
                    .fold(Vec2::ZERO, |acc, i| acc + self.agents.positions[i]);
                sum * (1.0 / members.len() as f32)
            };
            for _ in members.len()..target {
                let p = self.scatter_around(centroid, SCHOOL_SPREAD);
                self.spawn_agent(info.species, p, Some(school));
            }
        }
        tracing::debug!(school = school.0, size = target, "School resized");
        Ok(target)
    }

    /// Flag or clear a pending message for an agent (`None` = primary agent)
    pub fn set_message_pending(&mut self, agent: Option<AgentId>, pending: bool) -> Result<AgentId> {
        let id = match agent.or_else(|| self.primary_agent()) {
            Some(id) => id,
            None => return Err(EngineError::AgentNotFound(AgentId::new(0))),
        };
        let idx = self.agents.index_of(id).ok_or(EngineError::AgentNotFound(id))?;
        self.agents.behaviors[idx].set_message_pending(pending);
        Ok(id)
    }

    /// Drop a food pellet; it lands inside the canvas and rests on its sector floor
    pub fn drop_pellet(&mut self, position: Vec2) {
        let p = self.sectors.clamp_to_canvas(position);
        let floor = self.sectors.rect_at(p).bottom() - 2.0;
        let now = self.time();
        self.pellets.drop_pellet(p, floor, now);
    }

    /// Rebuild sectors for a new monitor layout and reassign every agent
    pub fn apply_monitors(&mut self, monitors: Vec<Rect>) -> Result<()> {
        self.sectors.rebuild(monitors, self.config.canvas.fallback)?;
        let rects = self.sectors.rects();
        self.zones.set_canvas(&rects);
        self.exploration = ExplorationMap::new(self.sectors.canvas(), self.config.canvas.exploration_cell_size);
        let now = self.time();
        self.growth.replant(&self.config.decor, &self.sectors, &mut self.rng, now);

        for i in 0..self.agents.count() {
            let p = self.sectors.clamp_to_canvas(self.agents.positions[i]);
            let p = self.legalize(p, p);
            let sector = self.sectors.locate(p);
            self.agents.positions[i] = p;
            self.agents.sectors[i] = sector;
            self.sectors.assign(self.agents.ids[i], sector);
        }
        Ok(())
    }

    /// Apply one external command at the start of a tick
    pub(crate) fn apply_command(&mut self, command: EngineCommand, events: &mut Vec<SimulationEvent>) {
        match command {
            EngineCommand::DropPellet { position } => self.drop_pellet(position),
            EngineCommand::ReplaceZones(zones) => {
                let offered = zones.len();
                let accepted = self.zones.replace_zones(zones);
                if accepted < offered {
                    events.push(SimulationEvent::CommandRejected {
                        reason: format!("{} of {} zones rejected", offered - accepted, offered),
                    });
                }
            }
            EngineCommand::ToggleSanctuary => {
                self.zones.toggle();
            }
            EngineCommand::AddMonitorZone(index) => {
                if !self.zones.add_monitor_zone(index) {
                    events.push(SimulationEvent::CommandRejected {
                        reason: format!("cannot exclude monitor {}", index),
                    });
                }
            }
            EngineCommand::ClearZones => self.zones.clear(),
            EngineCommand::MonitorsChanged(monitors) => match self.apply_monitors(monitors) {
                Ok(()) => events.push(SimulationEvent::TopologyRebuilt {
                    sectors: self.sectors.sectors().len(),
                    fallback: self.sectors.is_fallback(),
                }),
                Err(e) => {
                    tracing::warn!("Keeping previous monitor layout: {}", e);
                    events.push(SimulationEvent::CommandRejected {
                        reason: e.to_string(),
                    });
                }
            },
            EngineCommand::MessagePending { agent } => {
                if let Err(e) = self.set_message_pending(agent, true) {
                    events.push(SimulationEvent::CommandRejected {
                        reason: e.to_string(),
                    });
                }
            }
            EngineCommand::MessageDismissed { agent } => {
                if let Err(e) = self.set_message_pending(agent, false) {
                    events.push(SimulationEvent::CommandRejected {
                        reason: e.to_string(),
                    });
                }
            }
            EngineCommand::SwitchSpecies { species, count } => {
                let count = self.switch_species(species, count);
                events.push(SimulationEvent::PopulationChanged { species, count });
            }
            EngineCommand::ResizeSchool { school, count } => match self.set_school_size(school, count) {
                Ok(_) => events.push(SimulationEvent::PopulationChanged {
                    species: self.config.population.species,
                    count: self.agents.count(),
                }),
                Err(e) => events.push(SimulationEvent::CommandRejected {
                    reason: e.to_string(),
                }),
            },
            EngineCommand::SetLeafEnabled(enabled) => self.growth.set_leaf_enabled(enabled),
        }
    }

    /// Read-only view of the current state for renderers
    pub fn snapshot(&self) -> WorldSnapshot {
        let a = &self.agents;
        let agents = (0..a.count())
            .map(|i| AgentPose {
                id: a.ids[i],
                species: a.species[i],
                position: a.positions[i],
                heading: a.headings[i],
                speed: a.speeds[i],
                state: a.behaviors[i].state(),
                school: a.schools[i],
                sector: a.sectors[i],
            })
            .collect();

        let sectors = self
            .sectors
            .sectors()
            .iter()
            .map(|s| SectorView {
                id: s.id,
                rect: s.rect,
                owned: s.owned().iter().copied().collect(),
                visible: s.visible().iter().copied().collect(),
            })
            .collect();

        let now = self.time();
        let cycle = self.config.decor.plant_cycle_hours as f64 * 3600.0;
        let decorations = self
            .growth
            .plants()
            .iter()
            .map(|p| DecorationView {
                id: p.id,
                kind: p.kind,
                anchor: p.anchor,
                growth: p.growth(now, cycle),
            })
            .collect();

        WorldSnapshot {
            tick: self.current_tick(),
            time: now,
            agents,
            sectors,
            decorations,
            leaves: self.growth.leaves().iter().map(|l| l.position).collect(),
            pellets: self
                .pellets
                .pellets()
                .iter()
                .map(|p| PelletView {
                    id: p.id,
                    position: p.position,
                })
                .collect(),
            zones: self.zones.active_zones().map(|z| z.rect).collect(),
            sanctuary_enabled: self.zones.is_enabled(),
            eye_tracking_damping: self.config.render.eye_tracking_damping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::sectors::StaticMonitors;

    fn single() -> StaticMonitors {
        StaticMonitors(vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)])
    }

    #[test]
    fn test_world_spawns_configured_population() {
        let world = World::new(EngineConfig::default(), &single()).unwrap();
        assert_eq!(world.agent_count(), 6);
        assert_eq!(world.flock.schools().count(), 1);
        assert_eq!(world.primary_agent(), Some(AgentId::new(0)));
        for i in 0..world.agents.count() {
            assert!(world.sectors.contains(world.agents.positions[i]));
        }
    }

    #[test]
    fn test_solo_species_has_no_school() {
        let mut config = EngineConfig::default();
        config.population.species = Species::Betta;
        config.population.count = 2;
        let world = World::new(config, &single()).unwrap();

        assert_eq!(world.agent_count(), 2);
        assert!(world.agents.schools.iter().all(|s| s.is_none()));
    }

    #[test]
    fn test_school_resize_clamps() {
        let mut world = World::new(EngineConfig::default(), &single()).unwrap();
        let school = world.flock.schools().next().unwrap().id;

        assert_eq!(world.set_school_size(school, 40).unwrap(), 12);
        assert_eq!(world.agent_count(), 12);
        assert_eq!(world.set_school_size(school, 0).unwrap(), 1);
        assert_eq!(world.agent_count(), 1);
        assert!(matches!(
            world.set_school_size(SchoolId(99), 3),
            Err(EngineError::SchoolNotFound(_))
        ));
    }

    #[test]
    fn test_message_for_unknown_agent_is_an_error() {
        let mut world = World::new(EngineConfig::default(), &single()).unwrap();
        assert!(world.set_message_pending(Some(AgentId::new(500)), true).is_err());
        assert_eq!(world.set_message_pending(None, true).unwrap(), AgentId::new(0));
    }

    #[test]
    fn test_time_of_day_wraps() {
        let mut world = World::new(EngineConfig::default(), &single()).unwrap();
        world.set_start_hour(23.5);
        assert!((world.time_of_day() - 23.5).abs() < 1e-9);
        world.set_start_hour(25.0);
        assert!((world.time_of_day() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_lists_every_agent_once() {
        let world = World::new(EngineConfig::default(), &single()).unwrap();
        let snapshot = world.snapshot();
        assert_eq!(snapshot.agents.len(), 6);
        let owned: usize = snapshot.sectors.iter().map(|s| s.owned.len()).sum();
        assert_eq!(owned, 6);
        assert_eq!(snapshot.eye_tracking_damping, 0.18);
    }
}
