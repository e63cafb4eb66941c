//! Exploration memory and target sampling
//!
//! A coarse grid over the canvas remembers when any creature last passed
//! through each cell. New search targets favor cells that have gone unvisited
//! the longest and never land in a blocked area.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::core::config::{BehaviorConfig, CanvasConfig};
use crate::core::types::{Rect, SimTime, Vec2};
use crate::entity::behavior::TargetPlanner;
use crate::simulation::exclusion::ExclusionZoneField;
use crate::simulation::sectors::SectorManager;
use crate::spatial::Grid;

/// Candidate points drawn per sampling attempt
const SAMPLE_TRIES: usize = 20;
/// Legal candidates compared before picking the stalest
const SAMPLE_KEEP: usize = 6;
/// Staleness beyond this counts the same (seconds)
const STALENESS_CAP: f64 = 600.0;

/// Last-visit times over the canvas
#[derive(Debug, Clone)]
pub struct ExplorationMap {
    grid: Grid<Option<SimTime>>,
}

impl ExplorationMap {
    pub fn new(canvas: Rect, cell_size: f32) -> Self {
        Self {
            grid: Grid::covering(canvas, cell_size),
        }
    }

    pub fn record(&mut self, p: Vec2, now: SimTime) {
        let (x, y) = self.grid.world_to_cell(p);
        self.grid.set(x, y, Some(now));
    }

    /// Seconds since the cell containing `p` was visited (capped)
    pub fn staleness(&self, p: Vec2, now: SimTime) -> f64 {
        match self.grid.sample(p).copied().flatten() {
            Some(t) => (now - t).clamp(0.0, STALENESS_CAP),
            None => STALENESS_CAP,
        }
    }

    /// Fraction of cells visited at least once
    pub fn coverage(&self) -> f32 {
        let total = self.grid.width * self.grid.height;
        let visited = self.grid.cells().filter(|(_, _, v)| v.is_some()).count();
        visited as f32 / total as f32
    }
}

/// World-backed [`TargetPlanner`] for one tick
pub struct WorldPlanner<'a> {
    pub map: &'a ExplorationMap,
    pub sectors: &'a SectorManager,
    pub zones: &'a ExclusionZoneField,
    pub rng: &'a mut ChaCha8Rng,
    pub canvas: &'a CanvasConfig,
    pub behavior: &'a BehaviorConfig,
    pub now: SimTime,
}

impl WorldPlanner<'_> {
    fn legal(&self, p: Vec2) -> bool {
        self.sectors.contains(p) && !self.zones.is_blocked(p)
    }

    /// Uniform point in a sector chosen by area, kept `target_margin` from its edges
    fn random_point(&mut self) -> Vec2 {
        let sectors = self.sectors.sectors();
        let total: f32 = sectors.iter().map(|s| s.rect.area()).sum();
        let mut pick = self.rng.gen::<f32>() * total;
        let mut rect = self.sectors.canvas();
        for sector in sectors {
            rect = sector.rect;
            pick -= sector.rect.area();
            if pick <= 0.0 {
                break;
            }
        }

        let inner = rect.expand(-self.canvas.target_margin);
        let inner = if inner.is_valid() { inner } else { rect };
        Vec2::new(
            inner.x + self.rng.gen::<f32>() * inner.width,
            inner.y + self.rng.gen::<f32>() * inner.height,
        )
    }
}

impl TargetPlanner for WorldPlanner<'_> {
    fn exploration_target(&mut self, from: Vec2) -> Vec2 {
        let mut best: Option<(f64, Vec2)> = None;
        let mut kept = 0;
        for _ in 0..SAMPLE_TRIES {
            let candidate = self.random_point();
            if !self.legal(candidate) {
                continue;
            }
            let jitter = self.rng.gen::<f64>() * 5.0;
            let score = self.map.staleness(candidate, self.now) + jitter;
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, candidate));
            }
            kept += 1;
            if kept >= SAMPLE_KEEP {
                break;
            }
        }

        match best {
            Some((_, target)) => target,
            None => {
                tracing::debug!("No legal exploration target found, holding position");
                self.sectors.clamp_to_canvas(from)
            }
        }
    }

    fn drift_target(&mut self, from: Vec2) -> Option<Vec2> {
        let radius = self.behavior.drift_radius;
        for _ in 0..SAMPLE_TRIES {
            let offset = Vec2::new(
                self.rng.gen_range(-radius..=radius),
                self.rng.gen_range(-radius..=radius),
            );
            let candidate = from + offset;
            if self.legal(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn roll(&mut self) -> f32 {
        self.rng.gen()
    }

    fn dwell(&mut self) -> f32 {
        let min = self.behavior.idle_dwell_min;
        let max = self.behavior.idle_dwell_max.max(min);
        self.rng.gen_range(min..=max)
    }
}
