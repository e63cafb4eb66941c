//! Creature storage with SoA layout

use ahash::AHashMap;

use crate::core::types::{AgentId, SchoolId, SectorId, Vec2};
use crate::entity::behavior::BehaviorMachine;
use crate::entity::needs::Needs;
use crate::entity::species::Species;
use crate::motion::NoiseSource;

/// Everything needed to place a new creature
#[derive(Debug, Clone)]
pub struct AgentSpawn {
    pub id: AgentId,
    pub species: Species,
    pub position: Vec2,
    pub heading: f32,
    pub school: Option<SchoolId>,
    pub sector: SectorId,
    pub behavior: BehaviorMachine,
    pub noise: NoiseSource,
    /// Personal speed variation around the species cruise speed
    pub speed_mult: f32,
}

/// All live creatures, one column per attribute
#[derive(Debug, Clone, Default)]
pub struct AgentArchetype {
    pub ids: Vec<AgentId>,
    pub species: Vec<Species>,
    pub positions: Vec<Vec2>,
    pub velocities: Vec<Vec2>,
    /// Heading in radians, always finite
    pub headings: Vec<f32>,
    pub speeds: Vec<f32>,
    pub behaviors: Vec<BehaviorMachine>,
    pub needs: Vec<Needs>,
    pub schools: Vec<Option<SchoolId>>,
    /// Owning sector; exactly one per agent
    pub sectors: Vec<SectorId>,
    pub noise: Vec<NoiseSource>,
    pub speed_mults: Vec<f32>,
    index: AHashMap<AgentId, usize>,
}

impl AgentArchetype {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn spawn(&mut self, spawn: AgentSpawn) -> usize {
        let idx = self.ids.len();
        self.index.insert(spawn.id, idx);
        self.ids.push(spawn.id);
        self.species.push(spawn.species);
        self.positions.push(spawn.position);
        self.velocities.push(Vec2::ZERO);
        self.headings.push(spawn.heading);
        self.speeds.push(0.0);
        self.behaviors.push(spawn.behavior);
        self.needs.push(Needs::default());
        self.schools.push(spawn.school);
        self.sectors.push(spawn.sector);
        self.noise.push(spawn.noise);
        self.speed_mults.push(spawn.speed_mult);
        idx
    }

    /// Remove a creature, moving the last one into its slot
    pub fn remove(&mut self, id: AgentId) -> bool {
        let Some(idx) = self.index.remove(&id) else {
            return false;
        };
        self.ids.swap_remove(idx);
        self.species.swap_remove(idx);
        self.positions.swap_remove(idx);
        self.velocities.swap_remove(idx);
        self.headings.swap_remove(idx);
        self.speeds.swap_remove(idx);
        self.behaviors.swap_remove(idx);
        self.needs.swap_remove(idx);
        self.schools.swap_remove(idx);
        self.sectors.swap_remove(idx);
        self.noise.swap_remove(idx);
        self.speed_mults.swap_remove(idx);

        if let Some(&moved) = self.ids.get(idx) {
            self.index.insert(moved, idx);
        }
        true
    }

    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Indices of the members of one school
    pub fn iter_school(&self, school: SchoolId) -> impl Iterator<Item = usize> + '_ {
        self.schools
            .iter()
            .enumerate()
            .filter(move |(_, s)| **s == Some(school))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_at(archetype: &mut AgentArchetype, id: u32, x: f32) {
        archetype.spawn(AgentSpawn {
            id: AgentId::new(id),
            species: Species::NeonTetra,
            position: Vec2::new(x, 100.0),
            heading: 0.0,
            school: Some(SchoolId(0)),
            sector: SectorId(0),
            behavior: BehaviorMachine::new(0.0, 2.0),
            noise: NoiseSource::new(id),
            speed_mult: 1.0,
        });
    }

    #[test]
    fn test_spawn_and_lookup() {
        let mut archetype = AgentArchetype::new();
        spawn_at(&mut archetype, 3, 10.0);
        spawn_at(&mut archetype, 7, 20.0);

        assert_eq!(archetype.count(), 2);
        assert_eq!(archetype.index_of(AgentId::new(7)), Some(1));
        assert_eq!(archetype.index_of(AgentId::new(9)), None);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut archetype = AgentArchetype::new();
        for i in 0..4 {
            spawn_at(&mut archetype, i, i as f32 * 10.0);
        }

        assert!(archetype.remove(AgentId::new(1)));
        assert!(!archetype.remove(AgentId::new(1)));
        assert_eq!(archetype.count(), 3);

        let idx = archetype.index_of(AgentId::new(3)).unwrap();
        assert_eq!(archetype.positions[idx].x, 30.0);
        for (i, id) in archetype.ids.iter().enumerate() {
            assert_eq!(archetype.index_of(*id), Some(i));
        }
    }

    #[test]
    fn test_iter_school() {
        let mut archetype = AgentArchetype::new();
        spawn_at(&mut archetype, 0, 0.0);
        spawn_at(&mut archetype, 1, 0.0);
        archetype.schools[1] = None;

        let members: Vec<_> = archetype.iter_school(SchoolId(0)).collect();
        assert_eq!(members, vec![0]);
    }
}
