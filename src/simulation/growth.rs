//! Plant growth cycles and the ambient leaf emitter

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::DecorConfig;
use crate::core::types::{DecorationId, Rect, SimTime, Vec2};
use crate::entity::species::DecorationKind;
use crate::motion::NoiseSource;
use crate::simulation::sectors::SectorManager;

/// Cycle-boundary tolerance so float drift never skips a burst
const CYCLE_EPSILON: f64 = 1e-6;

/// Leaves are culled once this far outside the canvas (px)
const LEAF_CULL_MARGIN: f32 = 40.0;

/// A growing plant anchored to a sector floor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decoration {
    pub id: DecorationId,
    pub kind: DecorationKind,
    pub anchor: Vec2,
    /// Growth at the start of the current cycle
    cycle_start_growth: f64,
    pub last_reset: SimTime,
}

impl Decoration {
    /// Growth fraction in [0, 1]
    pub fn growth(&self, now: SimTime, cycle_seconds: f64) -> f32 {
        let elapsed = (now - self.last_reset).max(0.0);
        (self.cycle_start_growth + elapsed / cycle_seconds).clamp(0.0, 1.0) as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafParticle {
    pub id: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub age: f32,
    pub lifetime: f32,
    pub drift_seed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrowthEvent {
    PlantTrimmed { decoration: DecorationId, floor: f32 },
    LeafBurst { count: u32 },
}

/// Plants plus the leaf emitter
#[derive(Debug, Clone)]
pub struct GrowthSimulator {
    plants: Vec<Decoration>,
    leaves: Vec<LeafParticle>,
    leaf_enabled: bool,
    leaf_timer: f64,
    total_spawned: u64,
    next_leaf_id: u32,
    noise: NoiseSource,
}

impl GrowthSimulator {
    pub fn new(config: &DecorConfig, sectors: &SectorManager, seed: u64, rng: &mut ChaCha8Rng) -> Self {
        let mut sim = Self {
            plants: Vec::new(),
            leaves: Vec::new(),
            leaf_enabled: config.leaf_enabled,
            leaf_timer: 0.0,
            total_spawned: 0,
            next_leaf_id: 0,
            noise: NoiseSource::for_entity(seed, u32::MAX),
        };
        sim.plant(config, sectors, rng, 0.0);
        sim
    }

    /// Spread `plants_per_sector` plants along each sector floor
    ///
    /// Initial growth is staggered so the plants do not trim in unison.
    fn plant(&mut self, config: &DecorConfig, sectors: &SectorManager, rng: &mut ChaCha8Rng, now: SimTime) {
        self.plants.clear();
        let per_sector = config.plants_per_sector as usize;
        let floor = config.plant_trim_floor as f64;
        for sector in sectors.sectors() {
            let r = sector.rect;
            for i in 0..per_sector {
                let slot = r.width / per_sector as f32;
                let x = r.x + slot * (i as f32 + 0.2 + 0.6 * rng.gen::<f32>());
                let kind = DecorationKind::ALL[self.plants.len() % DecorationKind::ALL.len()];
                let start = floor + (1.0 - floor) * rng.gen::<f64>() * 0.5;
                self.plants.push(Decoration {
                    id: DecorationId(self.plants.len() as u32),
                    kind,
                    anchor: Vec2::new(x, r.bottom()),
                    cycle_start_growth: start,
                    last_reset: now,
                });
            }
        }
    }

    /// Re-plant after a monitor topology change
    pub fn replant(&mut self, config: &DecorConfig, sectors: &SectorManager, rng: &mut ChaCha8Rng, now: SimTime) {
        self.plant(config, sectors, rng, now);
        let canvas = sectors.canvas().expand(LEAF_CULL_MARGIN);
        self.leaves.retain(|l| canvas.contains_closed(l.position));
    }

    pub fn plants(&self) -> &[Decoration] {
        &self.plants
    }

    pub fn leaves(&self) -> &[LeafParticle] {
        &self.leaves
    }

    pub fn leaf_enabled(&self) -> bool {
        self.leaf_enabled
    }

    /// Turn the emitter on or off; a fresh cycle starts when turned on
    pub fn set_leaf_enabled(&mut self, enabled: bool) {
        if enabled && !self.leaf_enabled {
            self.leaf_timer = 0.0;
        }
        self.leaf_enabled = enabled;
    }

    /// Leaves emitted since startup
    pub fn total_spawned(&self) -> u64 {
        self.total_spawned
    }

    pub fn update(
        &mut self,
        dt: f32,
        now: SimTime,
        config: &DecorConfig,
        sectors: &SectorManager,
        rng: &mut ChaCha8Rng,
    ) -> Vec<GrowthEvent> {
        let mut events = Vec::new();
        self.grow_plants(now, config, &mut events);
        self.move_leaves(dt, now, config, sectors.canvas());

        if self.leaf_enabled {
            self.leaf_timer += dt as f64;
            let cycle = config.leaf_cycle_seconds as f64;
            while self.leaf_timer + CYCLE_EPSILON >= cycle {
                self.leaf_timer -= cycle;
                let count = self.burst(config, sectors, rng);
                tracing::debug!(count, total = self.total_spawned, "Leaf burst");
                events.push(GrowthEvent::LeafBurst { count });
            }
        }
        events
    }

    fn grow_plants(&mut self, now: SimTime, config: &DecorConfig, events: &mut Vec<GrowthEvent>) {
        let cycle_seconds = config.plant_cycle_hours as f64 * 3600.0;
        let floor = config.plant_trim_floor;
        for plant in &mut self.plants {
            let elapsed = (now - plant.last_reset).max(0.0);
            if plant.cycle_start_growth + elapsed / cycle_seconds >= 1.0 {
                plant.cycle_start_growth = floor as f64;
                plant.last_reset = now;
                events.push(GrowthEvent::PlantTrimmed {
                    decoration: plant.id,
                    floor,
                });
            }
        }
    }

    fn move_leaves(&mut self, dt: f32, now: SimTime, config: &DecorConfig, canvas: Rect) {
        let bounds = canvas.expand(LEAF_CULL_MARGIN);
        for leaf in &mut self.leaves {
            leaf.age += dt;
            let sway = self.noise.signal(now * 0.5 + leaf.drift_seed as f64, 1.0);
            leaf.velocity = Vec2::new(sway * config.leaf_drift, config.leaf_fall_speed);
            leaf.position += leaf.velocity * dt;
        }
        self.leaves
            .retain(|l| l.age < l.lifetime && bounds.contains_closed(l.position));
    }

    fn burst(&mut self, config: &DecorConfig, sectors: &SectorManager, rng: &mut ChaCha8Rng) -> u32 {
        let wanted = rng.gen_range(config.leaf_burst_min..=config.leaf_burst_max.max(config.leaf_burst_min));
        let room = config.max_live_leaves.saturating_sub(self.leaves.len());
        let count = (wanted as usize).min(room) as u32;

        let all = sectors.sectors();
        for _ in 0..count {
            let rect = all[rng.gen_range(0..all.len())].rect;
            let position = Vec2::new(rect.x + rng.gen::<f32>() * rect.width, rect.y);
            self.leaves.push(LeafParticle {
                id: self.next_leaf_id,
                position,
                velocity: Vec2::new(0.0, config.leaf_fall_speed),
                age: 0.0,
                lifetime: config.leaf_lifetime * rng.gen_range(0.8..=1.2),
                drift_seed: rng.gen_range(0.0..1000.0),
            });
            self.next_leaf_id = self.next_leaf_id.wrapping_add(1);
        }
        self.total_spawned += count as u64;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sectors() -> SectorManager {
        SectorManager::new(
            vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)],
            Rect::new(0.0, 0.0, 1920.0, 1080.0),
            250.0,
        )
        .unwrap()
    }

    #[test]
    fn test_growth_monotonic_then_trims_to_floor() {
        let config = DecorConfig {
            plant_cycle_hours: 0.01,
            plants_per_sector: 3,
            ..DecorConfig::default()
        };
        let sectors = sectors();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut sim = GrowthSimulator::new(&config, &sectors, 5, &mut rng);
        let cycle = config.plant_cycle_hours as f64 * 3600.0;
        let dt = 0.5;

        let mut previous: Vec<f32> = sim.plants().iter().map(|p| p.growth(0.0, cycle)).collect();
        let mut trims = 0;
        for step in 1..=400 {
            let now = step as f64 * dt as f64;
            let events = sim.update(dt, now, &config, &sectors, &mut rng);
            for (i, plant) in sim.plants().iter().enumerate() {
                let g = plant.growth(now, cycle);
                assert!((0.0..=1.0).contains(&g));
                let trimmed = events.iter().any(|e| {
                    matches!(e, GrowthEvent::PlantTrimmed { decoration, .. } if *decoration == plant.id)
                });
                if trimmed {
                    assert!((g - config.plant_trim_floor).abs() < 1e-6);
                    trims += 1;
                } else {
                    assert!(g >= previous[i], "growth went backwards");
                }
                previous[i] = g;
            }
        }
        assert!(trims >= 3);
    }

    #[test]
    fn test_leaf_bursts_over_ten_minutes() {
        let config = DecorConfig {
            leaf_enabled: true,
            leaf_cycle_seconds: 60.0,
            leaf_burst_min: 1,
            leaf_burst_max: 3,
            max_live_leaves: 100,
            ..DecorConfig::default()
        };
        let sectors = sectors();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut sim = GrowthSimulator::new(&config, &sectors, 11, &mut rng);
        let dt = 1.0 / 30.0;

        for step in 1..=(600 * 30) {
            sim.update(dt, step as f64 * dt as f64, &config, &sectors, &mut rng);
        }
        let total = sim.total_spawned();
        assert!((10..=30).contains(&total), "spawned {}", total);
    }

    #[test]
    fn test_live_leaves_capped() {
        let config = DecorConfig {
            leaf_enabled: true,
            leaf_cycle_seconds: 1.0,
            leaf_burst_min: 3,
            leaf_burst_max: 3,
            max_live_leaves: 5,
            leaf_lifetime: 1000.0,
            leaf_fall_speed: 0.1,
            ..DecorConfig::default()
        };
        let sectors = sectors();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut sim = GrowthSimulator::new(&config, &sectors, 2, &mut rng);

        for step in 1..=100 {
            sim.update(0.1, step as f64 * 0.1, &config, &sectors, &mut rng);
            assert!(sim.leaves().len() <= 5);
        }
    }

    #[test]
    fn test_disabled_emitter_is_silent() {
        let config = DecorConfig {
            leaf_cycle_seconds: 1.0,
            ..DecorConfig::default()
        };
        let sectors = sectors();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut sim = GrowthSimulator::new(&config, &sectors, 3, &mut rng);

        for step in 1..=50 {
            sim.update(0.1, step as f64 * 0.1, &config, &sectors, &mut rng);
        }
        assert_eq!(sim.total_spawned(), 0);

        sim.set_leaf_enabled(true);
        for step in 51..=75 {
            sim.update(0.1, step as f64 * 0.1, &config, &sectors, &mut rng);
        }
        assert!(sim.total_spawned() > 0);
    }

    #[test]
    fn test_leaves_spawn_on_top_edge_and_fall() {
        let config = DecorConfig {
            leaf_enabled: true,
            leaf_cycle_seconds: 1.0,
            ..DecorConfig::default()
        };
        let sectors = sectors();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut sim = GrowthSimulator::new(&config, &sectors, 8, &mut rng);

        sim.update(1.0, 1.0, &config, &sectors, &mut rng);
        assert!(!sim.leaves().is_empty());
        assert!(sim.leaves().iter().all(|l| l.position.y == 0.0));

        sim.update(0.5, 1.5, &config, &sectors, &mut rng);
        assert!(sim.leaves().iter().all(|l| l.position.y > 0.0));
    }
}
