//! Schooling: separation, alignment and cohesion between school mates
//!
//! Forces are computed read-only over agent state and fed to steering as a
//! bias, so they never bypass turn-rate or speed caps.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::core::config::FlockConfig;
use crate::core::types::{SchoolId, SimTime, Vec2, VECTOR_EPSILON};
use crate::entity::agents::AgentArchetype;
use crate::entity::species::Species;
use crate::spatial::SparseHashGrid;

/// Largest species spacing scale, for sizing grid cells
const MAX_SPACING_SCALE: f32 = 3.2;

/// Schools closer than this to their roaming target pick a new one soon (px)
const ROAM_ARRIVAL: f32 = 120.0;

/// A group of agents sharing a roaming target
#[derive(Debug, Clone, PartialEq)]
pub struct School {
    pub id: SchoolId,
    pub species: Species,
    pub roam_target: Vec2,
    pub retarget_at: SimTime,
}

/// Per-agent flocking terms, already weighted
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlockForces {
    pub separation: Vec2,
    pub alignment: Vec2,
    pub cohesion: Vec2,
    /// Weighted sum clamped to `max_bias`
    pub total: Vec2,
    pub neighbors: usize,
}

/// Schools and their per-tick forces
#[derive(Debug, Clone)]
pub struct FlockCoordinator {
    schools: BTreeMap<SchoolId, School>,
    next_id: u32,
    grid: SparseHashGrid,
}

impl FlockCoordinator {
    pub fn new(config: &FlockConfig) -> Self {
        Self {
            schools: BTreeMap::new(),
            next_id: 0,
            grid: SparseHashGrid::new(Self::cell_size(config)),
        }
    }

    fn cell_size(config: &FlockConfig) -> f32 {
        (config.separation_radius * MAX_SPACING_SCALE)
            .max(config.alignment_radius)
            .max(config.cohesion_radius)
    }

    pub fn create_school(&mut self, species: Species, roam_target: Vec2, retarget_at: SimTime) -> SchoolId {
        let id = SchoolId(self.next_id);
        self.next_id += 1;
        self.schools.insert(
            id,
            School {
                id,
                species,
                roam_target,
                retarget_at,
            },
        );
        id
    }

    pub fn remove_school(&mut self, id: SchoolId) -> Option<School> {
        self.schools.remove(&id)
    }

    pub fn clear(&mut self) {
        self.schools.clear();
    }

    pub fn school(&self, id: SchoolId) -> Option<&School> {
        self.schools.get(&id)
    }

    pub fn schools(&self) -> impl Iterator<Item = &School> + '_ {
        self.schools.values()
    }

    pub fn roam_target(&self, id: SchoolId) -> Option<Vec2> {
        self.schools.get(&id).map(|s| s.roam_target)
    }

    /// Pick fresh roaming targets for schools that are due
    ///
    /// A school whose centroid has reached its target is retargeted within
    /// a second instead of waiting out the full interval.
    pub fn update_roam_targets(
        &mut self,
        agents: &AgentArchetype,
        now: SimTime,
        config: &FlockConfig,
        mut sample: impl FnMut() -> Vec2,
    ) {
        for school in self.schools.values_mut() {
            let members: Vec<Vec2> = agents
                .iter_school(school.id)
                .map(|i| agents.positions[i])
                .collect();
            if !members.is_empty() {
                let centroid = members.iter().fold(Vec2::ZERO, |acc, p| acc + *p)
                    * (1.0 / members.len() as f32);
                if centroid.distance(&school.roam_target) < ROAM_ARRIVAL {
                    school.retarget_at = school.retarget_at.min(now + 1.0);
                }
            }
            if now >= school.retarget_at {
                school.roam_target = sample();
                school.retarget_at = now + config.school_retarget_seconds as f64;
                tracing::debug!(school = school.id.0, "School picked a new roaming target");
            }
        }
    }

    /// Flock forces for every agent, indexed like the agent columns
    ///
    /// Solo agents and agents with no school mate in range get zero.
    pub fn compute_forces(&mut self, agents: &AgentArchetype, config: &FlockConfig) -> Vec<FlockForces> {
        let grid = &mut self.grid;
        grid.rebuild(
            agents
                .positions
                .iter()
                .copied()
                .enumerate()
                .filter(|(i, _)| agents.schools[*i].is_some()),
        );
        let grid = &self.grid;

        if agents.count() >= config.parallel_threshold {
            (0..agents.count())
                .into_par_iter()
                .map(|i| forces_for(i, agents, grid, config))
                .collect()
        } else {
            (0..agents.count())
                .map(|i| forces_for(i, agents, grid, config))
                .collect()
        }
    }
}

fn forces_for(i: usize, agents: &AgentArchetype, grid: &SparseHashGrid, config: &FlockConfig) -> FlockForces {
    let Some(school) = agents.schools[i] else {
        return FlockForces::default();
    };
    let pos = agents.positions[i];
    let sep_radius = config.separation_radius * agents.species[i].profile().spacing_scale;
    let align_sq = config.alignment_radius * config.alignment_radius;
    let coh_sq = config.cohesion_radius * config.cohesion_radius;

    let mut separation = Vec2::ZERO;
    let mut heading_sum = Vec2::ZERO;
    let mut aligned = 0usize;
    let mut centroid = Vec2::ZERO;
    let mut cohesive = 0usize;
    let mut neighbors = 0usize;

    for j in grid.query_neighbors(pos) {
        if j == i || agents.schools[j] != Some(school) {
            continue;
        }
        let other = agents.positions[j];
        let d_sq = pos.distance_squared(&other);
        if d_sq > coh_sq.max(align_sq).max(sep_radius * sep_radius) {
            continue;
        }
        let d = d_sq.sqrt();
        if d < VECTOR_EPSILON {
            // Coincident mates give no usable direction
            continue;
        }
        neighbors += 1;

        if d < sep_radius {
            // Unit push away, scaled by 1/d (1.0 at the radius)
            separation += (pos - other) * (sep_radius / d_sq);
        }
        if d_sq <= align_sq {
            heading_sum += Vec2::from_angle(agents.headings[j]);
            aligned += 1;
        }
        if d_sq <= coh_sq {
            centroid += other;
            cohesive += 1;
        }
    }

    if neighbors == 0 {
        return FlockForces::default();
    }

    let alignment = if aligned > 0 {
        let average = heading_sum * (1.0 / aligned as f32);
        (average - Vec2::from_angle(agents.headings[i])) * 0.5
    } else {
        Vec2::ZERO
    };
    let cohesion = if cohesive > 0 {
        (centroid * (1.0 / cohesive as f32) - pos) * (1.0 / config.cohesion_radius)
    } else {
        Vec2::ZERO
    };

    let w = &config.weights;
    let separation = separation * w.separation;
    let alignment = alignment * w.alignment;
    let cohesion = cohesion * w.cohesion;
    let total = (separation + alignment + cohesion).clamp_length(config.max_bias);

    FlockForces {
        separation,
        alignment,
        cohesion,
        total: if total.is_finite() { total } else { Vec2::ZERO },
        neighbors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AgentId, SectorId};
    use crate::entity::agents::AgentSpawn;
    use crate::entity::behavior::BehaviorMachine;
    use crate::motion::NoiseSource;

    fn add(agents: &mut AgentArchetype, id: u32, pos: Vec2, heading: f32, school: Option<SchoolId>) {
        agents.spawn(AgentSpawn {
            id: AgentId::new(id),
            species: Species::NeonTetra,
            position: pos,
            heading,
            school,
            sector: SectorId(0),
            behavior: BehaviorMachine::new(0.0, 1.0),
            noise: NoiseSource::new(id),
            speed_mult: 1.0,
        });
    }

    #[test]
    fn test_close_mates_separate() {
        let config = FlockConfig::default();
        let mut flock = FlockCoordinator::new(&config);
        let school = flock.create_school(Species::NeonTetra, Vec2::ZERO, 0.0);
        let mut agents = AgentArchetype::new();
        add(&mut agents, 0, Vec2::new(100.0, 100.0), 0.0, Some(school));
        add(&mut agents, 1, Vec2::new(110.0, 100.0), 0.0, Some(school));

        let forces = flock.compute_forces(&agents, &config);
        assert!(forces[0].separation.x < 0.0);
        assert!(forces[1].separation.x > 0.0);
        assert_eq!(forces[0].neighbors, 1);
    }

    #[test]
    fn test_solo_and_isolated_agents_get_zero() {
        let config = FlockConfig::default();
        let mut flock = FlockCoordinator::new(&config);
        let school = flock.create_school(Species::NeonTetra, Vec2::ZERO, 0.0);
        let mut agents = AgentArchetype::new();
        add(&mut agents, 0, Vec2::new(100.0, 100.0), 0.0, None);
        add(&mut agents, 1, Vec2::new(105.0, 100.0), 0.0, Some(school));
        add(&mut agents, 2, Vec2::new(900.0, 900.0), 0.0, Some(school));

        let forces = flock.compute_forces(&agents, &config);
        assert_eq!(forces[0], FlockForces::default());
        // Agent 1's only neighbor is solo
        assert_eq!(forces[1].total, Vec2::ZERO);
        assert_eq!(forces[2].total, Vec2::ZERO);
    }

    #[test]
    fn test_coincident_mates_contribute_nothing() {
        let config = FlockConfig::default();
        let mut flock = FlockCoordinator::new(&config);
        let school = flock.create_school(Species::NeonTetra, Vec2::ZERO, 0.0);
        let mut agents = AgentArchetype::new();
        add(&mut agents, 0, Vec2::new(100.0, 100.0), 0.0, Some(school));
        add(&mut agents, 1, Vec2::new(100.0, 100.0), 1.0, Some(school));

        let forces = flock.compute_forces(&agents, &config);
        assert_eq!(forces[0].total, Vec2::ZERO);
        assert!(forces[0].total.is_finite());
    }

    #[test]
    fn test_bias_clamped() {
        let config = FlockConfig::default();
        let mut flock = FlockCoordinator::new(&config);
        let school = flock.create_school(Species::NeonTetra, Vec2::ZERO, 0.0);
        let mut agents = AgentArchetype::new();
        add(&mut agents, 0, Vec2::new(100.0, 100.0), 0.0, Some(school));
        for k in 1..8 {
            add(&mut agents, k, Vec2::new(100.5 + k as f32 * 0.01, 100.0), 3.0, Some(school));
        }

        let forces = flock.compute_forces(&agents, &config);
        assert!(forces[0].total.length() <= config.max_bias + 1e-4);
    }

    #[test]
    fn test_cohesion_pulls_toward_centroid() {
        let config = FlockConfig::default();
        let mut flock = FlockCoordinator::new(&config);
        let school = flock.create_school(Species::NeonTetra, Vec2::ZERO, 0.0);
        let mut agents = AgentArchetype::new();
        add(&mut agents, 0, Vec2::new(100.0, 100.0), 0.0, Some(school));
        add(&mut agents, 1, Vec2::new(200.0, 100.0), 0.0, Some(school));

        let forces = flock.compute_forces(&agents, &config);
        assert!(forces[0].cohesion.x > 0.0);
        assert_eq!(forces[0].separation, Vec2::ZERO);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = FlockConfig::default();
        let parallel = FlockConfig {
            parallel_threshold: 1,
            ..FlockConfig::default()
        };
        let mut flock = FlockCoordinator::new(&sequential);
        let school = flock.create_school(Species::NeonTetra, Vec2::ZERO, 0.0);
        let mut agents = AgentArchetype::new();
        for k in 0..40 {
            let pos = Vec2::new(100.0 + (k % 7) as f32 * 13.0, 100.0 + (k / 7) as f32 * 11.0);
            add(&mut agents, k, pos, k as f32 * 0.3, Some(school));
        }

        let a = flock.compute_forces(&agents, &sequential);
        let b = flock.compute_forces(&agents, &parallel);
        assert_eq!(a, b);
    }

    #[test]
    fn test_school_retargets_when_due() {
        let config = FlockConfig::default();
        let mut flock = FlockCoordinator::new(&config);
        let school = flock.create_school(Species::NeonTetra, Vec2::new(1000.0, 500.0), 8.0);
        let mut agents = AgentArchetype::new();
        add(&mut agents, 0, Vec2::new(100.0, 100.0), 0.0, Some(school));

        flock.update_roam_targets(&agents, 4.0, &config, || Vec2::new(1.0, 1.0));
        assert_eq!(flock.roam_target(school), Some(Vec2::new(1000.0, 500.0)));

        flock.update_roam_targets(&agents, 8.0, &config, || Vec2::new(1.0, 1.0));
        assert_eq!(flock.roam_target(school), Some(Vec2::new(1.0, 1.0)));
        assert_eq!(flock.school(school).unwrap().retarget_at, 16.0);
    }
}
