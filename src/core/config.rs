//! Engine configuration with documented defaults
//!
//! All tunables live here, grouped the way they appear in the TOML file.
//! Values are sanitized before the world uses them: anything out of range is
//! clamped to the nearest valid value (non-finite values fall back to the
//! default) and reported as a [`ConfigAdjustment`], so a bad file never stops
//! the simulation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::Rect;
use crate::entity::species::Species;
use crate::simulation::exclusion::ExclusionZone;

/// Default seed used when the config file does not name one
pub const DEFAULT_SEED: u64 = 20_240_611;

/// Top-level configuration for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for every random decision (target sampling, dwell timers, leaves)
    pub seed: u64,
    /// Fixed simulation rate. The display may run faster or slower.
    pub tick_rate_hz: f32,
    /// Upper bound on ticks run for one `advance` call; older backlog is dropped
    pub max_catch_up_ticks: u32,
    pub motion: MotionConfig,
    pub flock: FlockConfig,
    pub behavior: BehaviorConfig,
    pub sanctuary: SanctuaryConfig,
    pub decor: DecorConfig,
    pub render: RenderConfig,
    pub canvas: CanvasConfig,
    pub population: PopulationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            tick_rate_hz: 30.0,
            max_catch_up_ticks: 8,
            motion: MotionConfig::default(),
            flock: FlockConfig::default(),
            behavior: BehaviorConfig::default(),
            sanctuary: SanctuaryConfig::default(),
            decor: DecorConfig::default(),
            render: RenderConfig::default(),
            canvas: CanvasConfig::default(),
            population: PopulationConfig::default(),
        }
    }
}

/// Steering and physics limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Hard ceiling on any agent's speed (px/s). Species may be slower.
    pub max_speed: f32,
    /// Maximum heading change per tick (radians)
    ///
    /// At 30 Hz the default 0.1 rad/tick is 3 rad/s, the turn speed of a
    /// neon tetra. Slower-turning species scale this down, never up.
    pub turn_rate_cap: f32,
    /// Time constant (seconds) of the exponential speed smoothing
    pub speed_smoothing: f32,
    /// Agents slow down linearly inside this distance of their target (px)
    pub slowing_radius: f32,
    /// Peak lateral wobble added to each heading change (radians)
    pub wobble_amplitude: f32,
    /// How fast the wobble noise evolves (Hz)
    pub wobble_frequency: f32,
    /// Distance from a closed canvas edge where soft boundary pressure starts (px)
    pub boundary_margin: f32,
    /// Strength of the boundary pressure at the edge (unitless steering bias)
    pub boundary_strength: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_speed: 160.0,
            turn_rate_cap: 0.1,
            speed_smoothing: 0.35,
            slowing_radius: 80.0,
            wobble_amplitude: 0.04,
            wobble_frequency: 0.5,
            boundary_margin: 100.0,
            boundary_strength: 1.5,
        }
    }
}

/// Weights for the three flocking terms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockWeights {
    pub separation: f32,
    pub alignment: f32,
    pub cohesion: f32,
}

impl Default for FlockWeights {
    fn default() -> Self {
        Self {
            separation: 2.5,
            alignment: 1.2,
            cohesion: 0.8,
        }
    }
}

/// Flocking (schooling) parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockConfig {
    /// Neighbors closer than this are pushed away (px, before species spacing)
    pub separation_radius: f32,
    /// Neighbors within this distance contribute to alignment (px)
    pub alignment_radius: f32,
    /// Neighbors within this distance contribute to cohesion (px)
    pub cohesion_radius: f32,
    pub weights: FlockWeights,
    /// Combined flock bias is clamped to this length before steering
    pub max_bias: f32,
    /// Agent count above which flock forces are computed in parallel
    ///
    /// Below this, thread overhead exceeds the benefit.
    pub parallel_threshold: usize,
    /// Seconds between school roaming-target changes
    pub school_retarget_seconds: f32,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            separation_radius: 25.0,
            alignment_radius: 80.0,
            cohesion_radius: 120.0,
            weights: FlockWeights::default(),
            max_bias: 1.5,
            parallel_threshold: 256,
            school_retarget_seconds: 8.0,
        }
    }
}

/// Behavioral state machine tunables
///
/// Durations are seconds of simulation time; distances are pixels; needs are
/// fractions in 0..1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub idle_dwell_min: f32,
    pub idle_dwell_max: f32,
    /// Chance an expired idle dwell produces a gentle drift instead of a search
    pub drift_chance: f32,
    pub drift_radius: f32,
    pub arrival_radius: f32,
    /// Targets farther than this trigger a dart
    pub dart_distance: f32,
    pub dart_duration: f32,
    pub dart_speed_multiplier: f32,
    pub search_timeout: f32,
    pub hunger_rate: f32,
    pub hunger_search_threshold: f32,
    /// Fatigue gained per second at full speed
    pub fatigue_rate: f32,
    pub fatigue_threshold: f32,
    pub fatigue_recovered: f32,
    /// Fatigue shed per second while resting
    pub rest_recovery_rate: f32,
    pub rest_min_duration: f32,
    pub flare_chance: f32,
    pub flare_duration: f32,
    /// Depth below the sector top where surfacing is possible (px); keep it
    /// wider than `motion.boundary_margin` or edge pressure holds fish below it
    pub surface_band: f32,
    pub breath_chance: f32,
    pub breath_cooldown: f32,
    pub breath_duration: f32,
    pub feeding_timeout: f32,
    pub eat_radius: f32,
    pub pellet_sink_speed: f32,
    pub pellet_lifetime: f32,
    pub communicate_timeout: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            idle_dwell_min: 2.0,
            idle_dwell_max: 6.0,
            drift_chance: 0.4,
            drift_radius: 200.0,
            arrival_radius: 15.0,
            dart_distance: 700.0,
            dart_duration: 1.2,
            dart_speed_multiplier: 2.2,
            search_timeout: 25.0,
            hunger_rate: 0.003,
            hunger_search_threshold: 0.3,
            fatigue_rate: 0.01,
            fatigue_threshold: 0.8,
            fatigue_recovered: 0.3,
            rest_recovery_rate: 0.08,
            rest_min_duration: 5.0,
            flare_chance: 0.05,
            flare_duration: 3.0,
            surface_band: 120.0,
            breath_chance: 0.01,
            breath_cooldown: 30.0,
            breath_duration: 2.5,
            feeding_timeout: 4.0,
            eat_radius: 18.0,
            pellet_sink_speed: 12.0,
            pellet_lifetime: 60.0,
            communicate_timeout: 30.0,
        }
    }
}

/// Sanctuary (exclusion zone) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanctuaryConfig {
    /// Master switch; zones only repel while sanctuary mode is on
    pub enabled: bool,
    pub repulsion_strength: f32,
    /// Width of the soft band outside each zone where repulsion ramps up (px)
    pub repulsion_margin: f32,
    pub zones: Vec<ExclusionZone>,
    /// Monitor indices that are sanctuary zones in their entirety
    pub monitor_exclusions: Vec<usize>,
}

impl Default for SanctuaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repulsion_strength: 200.0,
            repulsion_margin: 80.0,
            zones: Vec::new(),
            monitor_exclusions: Vec::new(),
        }
    }
}

/// Decorations: plant growth and falling leaves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorConfig {
    pub leaf_enabled: bool,
    pub leaf_cycle_seconds: f32,
    pub leaf_burst_min: u32,
    pub leaf_burst_max: u32,
    pub max_live_leaves: usize,
    pub leaf_lifetime: f32,
    pub leaf_fall_speed: f32,
    /// Peak sideways drift speed of a falling leaf (px/s)
    pub leaf_drift: f32,
    pub plant_cycle_hours: f32,
    /// Growth fraction a plant is trimmed back to when it completes a cycle
    pub plant_trim_floor: f32,
    /// Plants spawned along the bottom of each sector
    pub plants_per_sector: u32,
}

impl Default for DecorConfig {
    fn default() -> Self {
        Self {
            leaf_enabled: false,
            leaf_cycle_seconds: 45.0,
            leaf_burst_min: 1,
            leaf_burst_max: 3,
            max_live_leaves: 24,
            leaf_lifetime: 30.0,
            leaf_fall_speed: 35.0,
            leaf_drift: 25.0,
            plant_cycle_hours: 6.0,
            plant_trim_floor: 0.35,
            plants_per_sector: 2,
        }
    }
}

/// Values consumed by the rendering collaborator but validated here
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Smoothing coefficient for the creature's eye tracking (0..1]
    pub eye_tracking_damping: f32,
    /// Sectors report agents this close to their edge as visible (px)
    pub sector_padding: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            eye_tracking_damping: 0.18,
            sector_padding: 250.0,
        }
    }
}

/// Canvas geometry fallbacks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Single synthetic sector used when monitors cannot be queried
    pub fallback: Rect,
    /// Cell size of the exploration memory grid (px)
    pub exploration_cell_size: f32,
    /// Keep sampled targets this far inside their sector (px)
    pub target_margin: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            fallback: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            exploration_cell_size: 160.0,
            target_margin: 50.0,
        }
    }
}

/// Initial population
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub species: Species,
    pub count: u32,
    pub max_school_size: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            species: Species::NeonTetra,
            count: 6,
            max_school_size: 12,
        }
    }
}

/// One value the sanitizer had to change
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigAdjustment {
    pub field: &'static str,
    pub original: f64,
    pub adjusted: f64,
}

/// Collects clamps while walking the config
struct Sanitizer {
    adjustments: Vec<ConfigAdjustment>,
}

impl Sanitizer {
    fn f32(&mut self, field: &'static str, value: &mut f32, min: f32, max: f32, default: f32) {
        let original = *value;
        let adjusted = if original.is_finite() {
            original.clamp(min, max)
        } else {
            default
        };
        if adjusted != original || !original.is_finite() {
            *value = adjusted;
            self.adjustments.push(ConfigAdjustment {
                field,
                original: original as f64,
                adjusted: adjusted as f64,
            });
        }
    }

    fn u32(&mut self, field: &'static str, value: &mut u32, min: u32, max: u32) {
        let original = *value;
        let adjusted = original.clamp(min, max);
        if adjusted != original {
            *value = adjusted;
            self.adjustments.push(ConfigAdjustment {
                field,
                original: original as f64,
                adjusted: adjusted as f64,
            });
        }
    }

    fn usize(&mut self, field: &'static str, value: &mut usize, min: usize, max: usize) {
        let original = *value;
        let adjusted = original.clamp(min, max);
        if adjusted != original {
            *value = adjusted;
            self.adjustments.push(ConfigAdjustment {
                field,
                original: original as f64,
                adjusted: adjusted as f64,
            });
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Fixed timestep derived from the tick rate
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate_hz
    }

    /// Clamp every tunable into its valid range
    ///
    /// Returns the list of changes; each one is also logged.
    pub fn sanitize(&mut self) -> Vec<ConfigAdjustment> {
        let mut s = Sanitizer {
            adjustments: Vec::new(),
        };

        s.f32("tick_rate_hz", &mut self.tick_rate_hz, 10.0, 240.0, 30.0);
        s.u32("max_catch_up_ticks", &mut self.max_catch_up_ticks, 1, 120);

        let m = &mut self.motion;
        s.f32("motion.max_speed", &mut m.max_speed, 10.0, 1000.0, 160.0);
        s.f32(
            "motion.turn_rate_cap",
            &mut m.turn_rate_cap,
            0.005,
            std::f32::consts::PI,
            0.1,
        );
        s.f32("motion.speed_smoothing", &mut m.speed_smoothing, 0.01, 10.0, 0.35);
        s.f32("motion.slowing_radius", &mut m.slowing_radius, 1.0, 1000.0, 80.0);
        s.f32("motion.wobble_amplitude", &mut m.wobble_amplitude, 0.0, 0.5, 0.04);
        s.f32("motion.wobble_frequency", &mut m.wobble_frequency, 0.0, 10.0, 0.5);
        s.f32("motion.boundary_margin", &mut m.boundary_margin, 1.0, 1000.0, 100.0);
        s.f32("motion.boundary_strength", &mut m.boundary_strength, 0.0, 10.0, 1.5);

        let f = &mut self.flock;
        s.f32("flock.separation_radius", &mut f.separation_radius, 1.0, 1000.0, 25.0);
        s.f32("flock.alignment_radius", &mut f.alignment_radius, 1.0, 2000.0, 80.0);
        s.f32("flock.cohesion_radius", &mut f.cohesion_radius, 1.0, 2000.0, 120.0);
        s.f32("flock.weights.separation", &mut f.weights.separation, 0.0, 10.0, 2.5);
        s.f32("flock.weights.alignment", &mut f.weights.alignment, 0.0, 10.0, 1.2);
        s.f32("flock.weights.cohesion", &mut f.weights.cohesion, 0.0, 10.0, 0.8);
        s.f32("flock.max_bias", &mut f.max_bias, 0.0, 10.0, 1.5);
        s.usize("flock.parallel_threshold", &mut f.parallel_threshold, 1, 1_000_000);
        s.f32(
            "flock.school_retarget_seconds",
            &mut f.school_retarget_seconds,
            0.5,
            600.0,
            8.0,
        );

        let b = &mut self.behavior;
        s.f32("behavior.idle_dwell_min", &mut b.idle_dwell_min, 0.1, 600.0, 2.0);
        let dwell_floor = b.idle_dwell_min;
        s.f32("behavior.idle_dwell_max", &mut b.idle_dwell_max, dwell_floor, 600.0, 6.0);
        s.f32("behavior.drift_chance", &mut b.drift_chance, 0.0, 1.0, 0.4);
        s.f32("behavior.drift_radius", &mut b.drift_radius, 1.0, 5000.0, 200.0);
        s.f32("behavior.arrival_radius", &mut b.arrival_radius, 1.0, 500.0, 15.0);
        s.f32("behavior.dart_distance", &mut b.dart_distance, 1.0, 20000.0, 700.0);
        s.f32("behavior.dart_duration", &mut b.dart_duration, 0.05, 30.0, 1.2);
        s.f32(
            "behavior.dart_speed_multiplier",
            &mut b.dart_speed_multiplier,
            1.0,
            10.0,
            2.2,
        );
        s.f32("behavior.search_timeout", &mut b.search_timeout, 1.0, 3600.0, 25.0);
        s.f32("behavior.hunger_rate", &mut b.hunger_rate, 0.0, 1.0, 0.003);
        s.f32(
            "behavior.hunger_search_threshold",
            &mut b.hunger_search_threshold,
            0.0,
            1.0,
            0.3,
        );
        s.f32("behavior.fatigue_rate", &mut b.fatigue_rate, 0.0, 1.0, 0.01);
        s.f32("behavior.fatigue_threshold", &mut b.fatigue_threshold, 0.05, 1.0, 0.8);
        let recovered_ceiling = b.fatigue_threshold;
        s.f32(
            "behavior.fatigue_recovered",
            &mut b.fatigue_recovered,
            0.0,
            recovered_ceiling,
            0.3,
        );
        s.f32("behavior.rest_recovery_rate", &mut b.rest_recovery_rate, 0.001, 10.0, 0.08);
        s.f32("behavior.rest_min_duration", &mut b.rest_min_duration, 0.0, 3600.0, 5.0);
        s.f32("behavior.flare_chance", &mut b.flare_chance, 0.0, 1.0, 0.05);
        s.f32("behavior.flare_duration", &mut b.flare_duration, 0.1, 60.0, 3.0);
        s.f32("behavior.surface_band", &mut b.surface_band, 0.0, 1000.0, 120.0);
        s.f32("behavior.breath_chance", &mut b.breath_chance, 0.0, 1.0, 0.01);
        s.f32("behavior.breath_cooldown", &mut b.breath_cooldown, 0.0, 3600.0, 30.0);
        s.f32("behavior.breath_duration", &mut b.breath_duration, 0.1, 60.0, 2.5);
        s.f32("behavior.feeding_timeout", &mut b.feeding_timeout, 0.1, 600.0, 4.0);
        s.f32("behavior.eat_radius", &mut b.eat_radius, 1.0, 500.0, 18.0);
        s.f32("behavior.pellet_sink_speed", &mut b.pellet_sink_speed, 0.0, 500.0, 12.0);
        s.f32("behavior.pellet_lifetime", &mut b.pellet_lifetime, 1.0, 3600.0, 60.0);
        s.f32(
            "behavior.communicate_timeout",
            &mut b.communicate_timeout,
            0.5,
            3600.0,
            30.0,
        );

        let z = &mut self.sanctuary;
        s.f32(
            "sanctuary.repulsion_strength",
            &mut z.repulsion_strength,
            1.0,
            10000.0,
            200.0,
        );
        s.f32("sanctuary.repulsion_margin", &mut z.repulsion_margin, 1.0, 1000.0, 80.0);
        z.zones.retain(|zone| {
            let keep = zone.rect.is_valid();
            if !keep {
                tracing::warn!("Dropping sanctuary zone '{}' with invalid rectangle", zone.label);
            }
            keep
        });

        let d = &mut self.decor;
        s.f32("decor.leaf_cycle_seconds", &mut d.leaf_cycle_seconds, 1.0, 86400.0, 45.0);
        s.u32("decor.leaf_burst_min", &mut d.leaf_burst_min, 1, 100);
        let burst_floor = d.leaf_burst_min;
        s.u32("decor.leaf_burst_max", &mut d.leaf_burst_max, burst_floor, 100);
        s.usize("decor.max_live_leaves", &mut d.max_live_leaves, 1, 10_000);
        s.f32("decor.leaf_lifetime", &mut d.leaf_lifetime, 0.5, 3600.0, 30.0);
        s.f32("decor.leaf_fall_speed", &mut d.leaf_fall_speed, 1.0, 1000.0, 35.0);
        s.f32("decor.leaf_drift", &mut d.leaf_drift, 0.0, 500.0, 25.0);
        s.f32("decor.plant_cycle_hours", &mut d.plant_cycle_hours, 0.001, 24.0 * 365.0, 6.0);
        s.f32("decor.plant_trim_floor", &mut d.plant_trim_floor, 0.0, 0.95, 0.35);
        s.u32("decor.plants_per_sector", &mut d.plants_per_sector, 0, 64);

        let r = &mut self.render;
        s.f32("render.eye_tracking_damping", &mut r.eye_tracking_damping, 0.01, 1.0, 0.18);
        s.f32("render.sector_padding", &mut r.sector_padding, 0.0, 2000.0, 250.0);

        let c = &mut self.canvas;
        s.f32("canvas.exploration_cell_size", &mut c.exploration_cell_size, 8.0, 4096.0, 160.0);
        s.f32("canvas.target_margin", &mut c.target_margin, 0.0, 500.0, 50.0);

        let p = &mut self.population;
        s.u32("population.max_school_size", &mut p.max_school_size, 1, 256);
        let school_ceiling = p.max_school_size;
        s.u32("population.count", &mut p.count, 1, school_ceiling);

        for adj in &s.adjustments {
            tracing::warn!(
                "Config value {} = {} out of range, using {}",
                adj.field,
                adj.original,
                adj.adjusted
            );
        }
        s.adjustments
    }

    /// Consume and return a sanitized copy
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }
}
