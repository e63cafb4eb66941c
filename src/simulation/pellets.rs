//! Food pellets dropped by the feeding collaborator

use serde::{Deserialize, Serialize};

use crate::core::types::{PelletId, SimTime, Vec2};

/// How much hunger one pellet satisfies
pub const PELLET_NUTRITION: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pellet {
    pub id: PelletId,
    pub position: Vec2,
    pub spawned_at: SimTime,
    /// Pellets come to rest here instead of sinking off screen
    pub floor_y: f32,
}

/// Live pellets, in drop order
#[derive(Debug, Clone, Default)]
pub struct PelletField {
    pellets: Vec<Pellet>,
    next_id: u32,
}

impl PelletField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drop_pellet(&mut self, position: Vec2, floor_y: f32, now: SimTime) -> PelletId {
        let id = PelletId(self.next_id);
        self.next_id += 1;
        self.pellets.push(Pellet {
            id,
            position,
            spawned_at: now,
            floor_y: floor_y.max(position.y),
        });
        id
    }

    pub fn pellets(&self) -> &[Pellet] {
        &self.pellets
    }

    pub fn len(&self) -> usize {
        self.pellets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pellets.is_empty()
    }

    /// Sink pellets and drop the ones past their lifetime; returns expired ids
    pub fn update(&mut self, dt: f32, now: SimTime, sink_speed: f32, lifetime: f32) -> Vec<PelletId> {
        for pellet in &mut self.pellets {
            pellet.position.y = (pellet.position.y + sink_speed * dt).min(pellet.floor_y);
        }
        let mut expired = Vec::new();
        self.pellets.retain(|p| {
            let alive = now - p.spawned_at < lifetime as f64;
            if !alive {
                expired.push(p.id);
            }
            alive
        });
        expired
    }

    /// Nearest pellet accepted by `reachable`
    pub fn nearest(&self, from: Vec2, reachable: impl Fn(Vec2) -> bool) -> Option<&Pellet> {
        self.pellets
            .iter()
            .filter(|p| reachable(p.position))
            .min_by(|a, b| {
                a.position
                    .distance_squared(&from)
                    .total_cmp(&b.position.distance_squared(&from))
            })
    }

    /// Eat the nearest pellet within `radius` accepted by `reachable`, if any
    pub fn consume_near(
        &mut self,
        from: Vec2,
        radius: f32,
        reachable: impl Fn(Vec2) -> bool,
    ) -> Option<Pellet> {
        let radius_sq = radius * radius;
        let idx = self
            .pellets
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.position.distance_squared(&from) <= radius_sq && reachable(p.position)
            })
            .min_by(|a, b| {
                a.1.position
                    .distance_squared(&from)
                    .total_cmp(&b.1.position.distance_squared(&from))
            })
            .map(|(i, _)| i)?;
        Some(self.pellets.remove(idx))
    }

    pub fn clear(&mut self) {
        self.pellets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pellets_sink_to_floor() {
        let mut field = PelletField::new();
        field.drop_pellet(Vec2::new(100.0, 990.0), 1000.0, 0.0);
        field.update(1.0, 1.0, 12.0, 60.0);
        assert_eq!(field.pellets()[0].position.y, 1000.0);
    }

    #[test]
    fn test_pellets_expire() {
        let mut field = PelletField::new();
        let id = field.drop_pellet(Vec2::new(100.0, 100.0), 1000.0, 0.0);
        assert!(field.update(0.1, 30.0, 12.0, 60.0).is_empty());
        assert_eq!(field.update(0.1, 60.0, 12.0, 60.0), vec![id]);
        assert!(field.is_empty());
    }

    #[test]
    fn test_consume_nearest_within_radius() {
        let mut field = PelletField::new();
        field.drop_pellet(Vec2::new(100.0, 100.0), 1000.0, 0.0);
        let near = field.drop_pellet(Vec2::new(105.0, 100.0), 1000.0, 0.0);

        assert!(field.consume_near(Vec2::new(200.0, 100.0), 18.0, |_| true).is_none());
        let eaten = field.consume_near(Vec2::new(110.0, 100.0), 18.0, |_| true).unwrap();
        assert_eq!(eaten.id, near);
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn test_consume_skips_unreachable_pellets() {
        let mut field = PelletField::new();
        let blocked = field.drop_pellet(Vec2::new(104.0, 100.0), 1000.0, 0.0);
        let open = field.drop_pellet(Vec2::new(90.0, 100.0), 1000.0, 0.0);

        let eaten = field
            .consume_near(Vec2::new(102.0, 100.0), 18.0, |p| p.x < 100.0)
            .unwrap();
        assert_eq!(eaten.id, open);
        assert!(field.consume_near(Vec2::new(102.0, 100.0), 18.0, |p| p.x < 100.0).is_none());
        assert_eq!(field.pellets()[0].id, blocked);
    }

    #[test]
    fn test_nearest_respects_reachability() {
        let mut field = PelletField::new();
        field.drop_pellet(Vec2::new(10.0, 0.0), 1000.0, 0.0);
        field.drop_pellet(Vec2::new(50.0, 0.0), 1000.0, 0.0);

        let best = field.nearest(Vec2::ZERO, |p| p.x > 20.0).unwrap();
        assert_eq!(best.position.x, 50.0);
    }
}
