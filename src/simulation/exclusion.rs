//! Exclusion zones ("sanctuary" areas creatures keep out of)
//!
//! Zones push agents away through a soft repulsion band and, as a last resort,
//! through [`ExclusionZoneField::eject`], which moves a committed position out of
//! any zone it ended up in.

use serde::{Deserialize, Serialize};

use crate::core::config::SanctuaryConfig;
use crate::core::types::{Rect, Vec2, VECTOR_EPSILON};

/// Inside a zone the push toward the nearest edge is this multiple of strength
const INSIDE_MULTIPLIER: f32 = 3.0;

/// Distance ejected agents are placed beyond the zone edge (px)
const EJECT_CLEARANCE: f32 = 0.5;

/// Rounds of re-projection when an ejection lands in a neighboring zone
const EJECT_ROUNDS: usize = 3;

/// Daily activation window in hours [0, 24); may wrap past midnight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSchedule {
    pub start_hour: f64,
    pub end_hour: f64,
}

impl ZoneSchedule {
    pub fn contains(&self, hour: f64) -> bool {
        let hour = hour.rem_euclid(24.0);
        if self.start_hour == self.end_hour {
            true
        } else if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

fn default_true() -> bool {
    true
}

/// A rectangle creatures must not end a tick inside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub label: String,
    pub rect: Rect,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub schedule: Option<ZoneSchedule>,
    /// Set when the zone tracks a whole monitor; its rect follows topology changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<usize>,
    #[serde(skip, default = "default_true")]
    in_window: bool,
}

impl ExclusionZone {
    pub fn new(label: impl Into<String>, rect: Rect) -> Self {
        Self {
            label: label.into(),
            rect,
            active: true,
            schedule: None,
            monitor: None,
            in_window: true,
        }
    }

    pub fn with_schedule(mut self, schedule: ZoneSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Whether the zone repels right now (ignoring the sanctuary master switch)
    pub fn is_live(&self) -> bool {
        self.active && self.in_window
    }

    /// Outward unit normal of the edge nearest to an interior point
    fn nearest_edge_normal(&self, p: Vec2) -> Vec2 {
        let r = &self.rect;
        let candidates = [
            (p.x - r.x, Vec2::new(-1.0, 0.0)),
            (r.right() - p.x, Vec2::new(1.0, 0.0)),
            (p.y - r.y, Vec2::new(0.0, -1.0)),
            (r.bottom() - p.y, Vec2::new(0.0, 1.0)),
        ];
        candidates
            .iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|c| c.1)
            .unwrap_or(Vec2::ZERO)
    }

    /// Points just outside each edge, level with `p`
    fn exits(&self, p: Vec2) -> [Vec2; 4] {
        let r = &self.rect;
        [
            Vec2::new(r.x - EJECT_CLEARANCE, p.y),
            Vec2::new(r.right() + EJECT_CLEARANCE, p.y),
            Vec2::new(p.x, r.y - EJECT_CLEARANCE),
            Vec2::new(p.x, r.bottom() + EJECT_CLEARANCE),
        ]
    }
}

/// All exclusion zones plus the sanctuary switch
#[derive(Debug, Clone)]
pub struct ExclusionZoneField {
    enabled: bool,
    strength: f32,
    margin: f32,
    zones: Vec<ExclusionZone>,
    /// Monitor rectangles, used to resolve monitor zones and reject zones
    /// that would leave no legal space
    canvas: Vec<Rect>,
}

impl ExclusionZoneField {
    pub fn new(config: &SanctuaryConfig, canvas: &[Rect]) -> Self {
        let mut field = Self {
            enabled: config.enabled,
            strength: config.repulsion_strength,
            margin: config.repulsion_margin,
            zones: Vec::new(),
            canvas: canvas.to_vec(),
        };
        for zone in &config.zones {
            field.add_zone(zone.clone());
        }
        for &index in &config.monitor_exclusions {
            field.add_monitor_zone(index);
        }
        field
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flip sanctuary mode, returning the new state
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        tracing::info!(enabled = self.enabled, "Sanctuary mode toggled");
        self.enabled
    }

    pub fn zones(&self) -> &[ExclusionZone] {
        &self.zones
    }

    /// Zones currently repelling
    pub fn active_zones(&self) -> impl Iterator<Item = &ExclusionZone> + '_ {
        let enabled = self.enabled;
        self.zones.iter().filter(move |z| enabled && z.is_live())
    }

    fn covers_canvas(&self, rect: &Rect) -> bool {
        !self.canvas.is_empty() && self.canvas.iter().all(|c| rect.covers(c))
    }

    /// Add a zone; invalid zones and zones covering the whole canvas are rejected
    pub fn add_zone(&mut self, zone: ExclusionZone) -> bool {
        if !zone.rect.is_valid() {
            tracing::warn!("Rejecting sanctuary zone '{}': invalid rectangle", zone.label);
            return false;
        }
        if self.covers_canvas(&zone.rect) {
            tracing::warn!(
                "Rejecting sanctuary zone '{}': it covers the entire canvas",
                zone.label
            );
            return false;
        }
        self.zones.push(zone);
        true
    }

    /// Add a zone covering one monitor entirely
    pub fn add_monitor_zone(&mut self, index: usize) -> bool {
        let Some(&rect) = self.canvas.get(index) else {
            tracing::warn!(index, "No monitor for sanctuary zone");
            return false;
        };
        let mut zone = ExclusionZone::new(format!("monitor {}", index), rect);
        zone.monitor = Some(index);
        self.add_zone(zone)
    }

    pub fn remove_zone(&mut self, index: usize) -> Option<ExclusionZone> {
        if index < self.zones.len() {
            Some(self.zones.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    /// Swap in a new zone list, returning how many zones were accepted
    pub fn replace_zones(&mut self, zones: Vec<ExclusionZone>) -> usize {
        self.zones.clear();
        zones
            .into_iter()
            .map(|z| self.add_zone(z))
            .filter(|accepted| *accepted)
            .count()
    }

    /// New monitor topology: monitor zones follow their monitor or disappear
    pub fn set_canvas(&mut self, canvas: &[Rect]) {
        self.canvas = canvas.to_vec();
        let zones = std::mem::take(&mut self.zones);
        for mut zone in zones {
            if let Some(index) = zone.monitor {
                match canvas.get(index) {
                    Some(&rect) => zone.rect = rect,
                    None => {
                        tracing::info!("Dropping zone '{}': monitor is gone", zone.label);
                        continue;
                    }
                }
            }
            self.add_zone(zone);
        }
    }

    /// Re-evaluate schedule windows for the given hour of day
    pub fn refresh(&mut self, hour_of_day: f64) {
        for zone in &mut self.zones {
            let in_window = zone.schedule.map_or(true, |s| s.contains(hour_of_day));
            if in_window != zone.in_window {
                tracing::debug!(zone = %zone.label, in_window, "Zone schedule changed");
                zone.in_window = in_window;
            }
        }
    }

    /// Summed repulsion at `p` from all active zones
    ///
    /// Quadratic ramp from zero at the outer edge of the margin to `strength`
    /// at the zone boundary; inside, `3 * strength` toward the nearest edge.
    pub fn repulsion(&self, p: Vec2) -> Vec2 {
        if !p.is_finite() {
            return Vec2::ZERO;
        }
        let mut total = Vec2::ZERO;
        for zone in self.active_zones() {
            if zone.rect.contains_strict(p) {
                total += zone.nearest_edge_normal(p) * (self.strength * INSIDE_MULTIPLIER);
                continue;
            }
            let d_sq = zone.rect.distance_squared_to(p);
            if d_sq >= self.margin * self.margin {
                continue;
            }
            let d = d_sq.sqrt();
            if d < VECTOR_EPSILON {
                // On the boundary itself
                total += zone.nearest_edge_normal(p) * self.strength;
                continue;
            }
            let closest = zone.rect.closest_point(p);
            let away = (p - closest) * (1.0 / d);
            let t = (self.margin - d) / self.margin;
            total += away * (self.strength * t * t);
        }
        total
    }

    /// Strength used to normalize repulsion into a steering bias
    pub fn strength(&self) -> f32 {
        self.strength
    }

    /// Inside an active zone or its margin band
    pub fn is_blocked(&self, p: Vec2) -> bool {
        let margin_sq = self.margin * self.margin;
        self.active_zones()
            .any(|z| z.rect.contains(p) || z.rect.distance_squared_to(p) < margin_sq)
    }

    /// Strictly inside an active zone
    pub fn is_inside_active(&self, p: Vec2) -> bool {
        self.active_zones().any(|z| z.rect.contains_strict(p))
    }

    /// Move `p` out of every active zone
    ///
    /// Returns `p` unchanged when it is already legal, the nearest edge exit
    /// otherwise, and `None` when no legal exit exists. `clamp` maps a point
    /// into the canvas.
    pub fn eject(&self, p: Vec2, clamp: impl Fn(Vec2) -> Vec2) -> Option<Vec2> {
        if !self.is_inside_active(p) {
            return Some(p);
        }

        let mut seeds = vec![p];
        for _ in 0..EJECT_ROUNDS {
            let mut candidates = Vec::new();
            for seed in &seeds {
                for zone in self.active_zones().filter(|z| z.rect.contains_strict(*seed)) {
                    candidates.extend(zone.exits(*seed).iter().map(|&c| clamp(c)));
                }
            }
            if candidates.is_empty() {
                return None;
            }

            let best = candidates
                .iter()
                .filter(|c| c.is_finite() && !self.is_inside_active(**c))
                .min_by(|a, b| a.distance_squared(&p).total_cmp(&b.distance_squared(&p)));
            if let Some(&best) = best {
                return Some(best);
            }
            seeds = candidates;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Vec<Rect> {
        vec![
            Rect::new(0.0, 0.0, 1920.0, 1080.0),
            Rect::new(1920.0, 0.0, 1920.0, 1080.0),
        ]
    }

    fn field_with(zones: Vec<ExclusionZone>) -> ExclusionZoneField {
        let config = SanctuaryConfig {
            enabled: true,
            zones,
            ..SanctuaryConfig::default()
        };
        ExclusionZoneField::new(&config, &canvas())
    }

    fn square() -> ExclusionZone {
        ExclusionZone::new("square", Rect::new(500.0, 500.0, 200.0, 200.0))
    }

    #[test]
    fn test_no_repulsion_beyond_margin() {
        let field = field_with(vec![square()]);
        assert_eq!(field.repulsion(Vec2::new(300.0, 600.0)), Vec2::ZERO);
    }

    #[test]
    fn test_repulsion_grows_toward_boundary() {
        let field = field_with(vec![square()]);
        let far = field.repulsion(Vec2::new(440.0, 600.0));
        let near = field.repulsion(Vec2::new(480.0, 600.0));

        assert!(far.x < 0.0 && near.x < 0.0);
        assert!(near.length() > far.length());
        assert!(near.y.abs() < 1e-4);
    }

    #[test]
    fn test_inside_pushes_to_nearest_edge() {
        let field = field_with(vec![square()]);
        let f = field.repulsion(Vec2::new(690.0, 600.0));
        assert!(f.x > 0.0);
        assert!((f.length() - 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_disabled_or_inactive_contributes_nothing() {
        let mut field = field_with(vec![square()]);
        field.set_enabled(false);
        assert_eq!(field.repulsion(Vec2::new(600.0, 600.0)), Vec2::ZERO);
        assert!(!field.is_inside_active(Vec2::new(600.0, 600.0)));

        let mut zone = square();
        zone.active = false;
        let field = field_with(vec![zone]);
        assert_eq!(field.repulsion(Vec2::new(600.0, 600.0)), Vec2::ZERO);
    }

    #[test]
    fn test_overlapping_zones_sum() {
        let single = field_with(vec![square()]);
        let double = field_with(vec![square(), square()]);
        let p = Vec2::new(470.0, 600.0);
        let a = single.repulsion(p);
        let b = double.repulsion(p);
        assert!((b.x - 2.0 * a.x).abs() < 1e-3);
    }

    #[test]
    fn test_schedule_wraps_midnight() {
        let night = ZoneSchedule {
            start_hour: 22.0,
            end_hour: 6.0,
        };
        assert!(night.contains(23.5));
        assert!(night.contains(2.0));
        assert!(!night.contains(12.0));

        let mut field = field_with(vec![square().with_schedule(night)]);
        field.refresh(12.0);
        assert_eq!(field.active_zones().count(), 0);
        field.refresh(23.0);
        assert_eq!(field.active_zones().count(), 1);
    }

    #[test]
    fn test_eject_to_nearest_edge() {
        let field = field_with(vec![square()]);
        let canvas = canvas()[0];
        let out = field
            .eject(Vec2::new(510.0, 600.0), |p| canvas.clamp_point(p))
            .unwrap();
        assert!(!field.is_inside_active(out));
        assert!(out.x < 500.0);
        assert_eq!(out.y, 600.0);
    }

    #[test]
    fn test_eject_skips_into_neighbor_zone() {
        let left = ExclusionZone::new("left", Rect::new(300.0, 500.0, 200.0, 200.0));
        let field = field_with(vec![square(), left]);
        let canvas = canvas()[0];
        let out = field
            .eject(Vec2::new(505.0, 690.0), |p| canvas.clamp_point(p))
            .unwrap();
        assert!(!field.is_inside_active(out));
        assert!(out.y > 700.0);
    }

    #[test]
    fn test_legal_point_unchanged() {
        let field = field_with(vec![square()]);
        let p = Vec2::new(100.0, 100.0);
        assert_eq!(field.eject(p, |p| p), Some(p));
    }

    #[test]
    fn test_zone_covering_canvas_rejected() {
        let mut field = field_with(vec![]);
        let everything = ExclusionZone::new("all", Rect::new(-10.0, -10.0, 5000.0, 2000.0));
        assert!(!field.add_zone(everything));
        assert!(field.zones().is_empty());
    }

    #[test]
    fn test_monitor_zone_follows_topology() {
        let mut field = field_with(vec![]);
        assert!(field.add_monitor_zone(1));
        assert!(field.is_inside_active(Vec2::new(2500.0, 500.0)));
        assert!(!field.add_monitor_zone(5));

        field.set_canvas(&[Rect::new(0.0, 0.0, 1920.0, 1080.0)]);
        assert!(field.zones().is_empty());
    }

    #[test]
    fn test_toggle_remove_clear() {
        let mut field = field_with(vec![square(), square()]);
        assert!(!field.toggle());
        assert!(field.toggle());
        assert!(field.remove_zone(0).is_some());
        assert!(field.remove_zone(5).is_none());
        assert_eq!(field.zones().len(), 1);
        field.clear();
        assert!(field.zones().is_empty());
    }

    #[test]
    fn test_blocked_includes_margin() {
        let field = field_with(vec![square()]);
        assert!(field.is_blocked(Vec2::new(450.0, 600.0)));
        assert!(field.is_blocked(Vec2::new(600.0, 600.0)));
        assert!(!field.is_blocked(Vec2::new(300.0, 600.0)));
    }
}
