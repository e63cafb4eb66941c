//! Rendering sectors derived from monitor geometry
//!
//! Each physical monitor becomes one sector of the combined canvas. Every agent
//! is owned by exactly one sector: the first sector (in monitor order) whose
//! half-open rectangle contains it, or the nearest sector when the agent sits
//! outside all of them.

use std::collections::BTreeSet;
use std::str::FromStr;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::{AgentId, Rect, SectorId, Vec2};

/// Source of monitor rectangles in combined-canvas coordinates
pub trait MonitorProvider {
    fn monitors(&self) -> Result<Vec<Rect>>;
}

/// Fixed monitor layout for headless runs and tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticMonitors(pub Vec<Rect>);

impl MonitorProvider for StaticMonitors {
    fn monitors(&self) -> Result<Vec<Rect>> {
        Ok(self.0.clone())
    }
}

impl FromStr for StaticMonitors {
    type Err = EngineError;

    /// Parse a comma-separated list of `WxH+X+Y` geometries
    fn from_str(s: &str) -> Result<Self> {
        let mut rects = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            rects.push(parse_geometry(part)?);
        }
        Ok(StaticMonitors(rects))
    }
}

fn parse_geometry(geometry: &str) -> Result<Rect> {
    let invalid = || EngineError::InvalidMonitorSpec(geometry.to_string());

    let (size, offset) = match geometry.find(['+', '-']) {
        Some(i) => geometry.split_at(i),
        None => (geometry, "+0+0"),
    };
    let (w, h) = size.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: f32 = w.trim().parse().map_err(|_| invalid())?;
    let height: f32 = h.trim().parse().map_err(|_| invalid())?;

    // Offsets keep their sign: "+1920+0", "-1280+0"
    let second = offset[1..].find(['+', '-']).map(|i| i + 1).ok_or_else(invalid)?;
    let x: f32 = offset[..second].parse().map_err(|_| invalid())?;
    let y: f32 = offset[second..].parse().map_err(|_| invalid())?;

    let rect = Rect::new(x, y, width, height);
    if rect.is_valid() {
        Ok(rect)
    } else {
        Err(invalid())
    }
}

/// One monitor's region and the agents it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub rect: Rect,
    owned: BTreeSet<AgentId>,
    visible: BTreeSet<AgentId>,
}

impl Sector {
    fn new(id: SectorId, rect: Rect) -> Self {
        Self {
            id,
            rect,
            owned: BTreeSet::new(),
            visible: BTreeSet::new(),
        }
    }

    pub fn owned(&self) -> &BTreeSet<AgentId> {
        &self.owned
    }

    /// Agents this sector should draw, including ones straddling its edges
    pub fn visible(&self) -> &BTreeSet<AgentId> {
        &self.visible
    }
}

/// An agent moved from one sector to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    pub agent: AgentId,
    pub from: SectorId,
    pub to: SectorId,
}

/// The tiling of sectors over the combined canvas
#[derive(Debug, Clone)]
pub struct SectorManager {
    sectors: Vec<Sector>,
    canvas: Rect,
    padding: f32,
    fallback: bool,
}

impl SectorManager {
    /// Build sectors from monitor rectangles
    ///
    /// Invalid rectangles are skipped. With nothing usable left, a single
    /// sector covering `fallback` is used instead; if that has no area either,
    /// there is no canvas at all.
    pub fn new(monitors: Vec<Rect>, fallback: Rect, padding: f32) -> Result<Self> {
        let (rects, is_fallback) = Self::usable_rects(monitors, fallback)?;
        let canvas = Rect::bounding(&rects).ok_or(EngineError::NoCanvasGeometry)?;
        let sectors = rects
            .into_iter()
            .enumerate()
            .map(|(i, r)| Sector::new(SectorId(i as u32), r))
            .collect();

        Ok(Self {
            sectors,
            canvas,
            padding,
            fallback: is_fallback,
        })
    }

    /// Query the provider, falling back to a single synthetic sector on failure
    pub fn from_provider(
        provider: &dyn MonitorProvider,
        fallback: Rect,
        padding: f32,
    ) -> Result<Self> {
        let monitors = match provider.monitors() {
            Ok(monitors) => monitors,
            Err(e) => {
                tracing::warn!("Monitor query failed ({}), using fallback canvas", e);
                Vec::new()
            }
        };
        Self::new(monitors, fallback, padding)
    }

    fn usable_rects(monitors: Vec<Rect>, fallback: Rect) -> Result<(Vec<Rect>, bool)> {
        let total = monitors.len();
        let rects: Vec<Rect> = monitors.into_iter().filter(Rect::is_valid).collect();
        if rects.len() < total {
            tracing::warn!("Ignoring {} monitor(s) with invalid geometry", total - rects.len());
        }
        if !rects.is_empty() {
            return Ok((rects, false));
        }
        if !fallback.is_valid() {
            return Err(EngineError::NoCanvasGeometry);
        }
        tracing::warn!(
            "No monitor geometry available, using fallback {}x{} canvas",
            fallback.width,
            fallback.height
        );
        Ok((vec![fallback], true))
    }

    /// Replace the sector tiling after a topology change
    ///
    /// Ownership is cleared; the caller reassigns every agent afterwards.
    pub fn rebuild(&mut self, monitors: Vec<Rect>, fallback: Rect) -> Result<()> {
        let rebuilt = Self::new(monitors, fallback, self.padding)?;
        tracing::info!(
            sectors = rebuilt.sectors.len(),
            "Rebuilt sectors for new monitor topology"
        );
        *self = rebuilt;
        Ok(())
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn get(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id.0 as usize)
    }

    pub fn rects(&self) -> Vec<Rect> {
        self.sectors.iter().map(|s| s.rect).collect()
    }

    /// Bounding box of all sectors
    pub fn canvas(&self) -> Rect {
        self.canvas
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Whether any sector contains `p`
    pub fn contains(&self, p: Vec2) -> bool {
        self.sectors.iter().any(|s| s.rect.contains(p))
    }

    /// Owning sector for a point
    pub fn locate(&self, p: Vec2) -> SectorId {
        if let Some(s) = self.sectors.iter().find(|s| s.rect.contains(p)) {
            return s.id;
        }
        self.sectors
            .iter()
            .min_by_key(|s| OrderedFloat(s.rect.distance_squared_to(p)))
            .map(|s| s.id)
            .unwrap_or(SectorId(0))
    }

    /// Rectangle of the sector owning `p`
    pub fn rect_at(&self, p: Vec2) -> Rect {
        self.get(self.locate(p)).map(|s| s.rect).unwrap_or(self.canvas)
    }

    /// Move `p` into the union of sectors, onto the nearest sector if outside
    pub fn clamp_to_canvas(&self, p: Vec2) -> Vec2 {
        if self.contains(p) {
            return p;
        }
        self.rect_at(p).clamp_point(p)
    }

    /// Record initial ownership
    pub fn assign(&mut self, agent: AgentId, sector: SectorId) {
        if let Some(s) = self.sectors.get_mut(sector.0 as usize) {
            s.owned.insert(agent);
        }
    }

    /// Drop an agent from a sector (despawn)
    pub fn release(&mut self, agent: AgentId, sector: SectorId) {
        if let Some(s) = self.sectors.get_mut(sector.0 as usize) {
            s.owned.remove(&agent);
            s.visible.remove(&agent);
        }
    }

    /// Reassign ownership for an agent's new position
    pub fn update_owner(&mut self, agent: AgentId, current: SectorId, p: Vec2) -> Option<Handoff> {
        let next = self.locate(p);
        if next == current {
            return None;
        }
        if let Some(s) = self.sectors.get_mut(current.0 as usize) {
            s.owned.remove(&agent);
        }
        if let Some(s) = self.sectors.get_mut(next.0 as usize) {
            s.owned.insert(agent);
        }
        Some(Handoff {
            agent,
            from: current,
            to: next,
        })
    }

    /// Number of sectors claiming ownership of `agent`
    pub fn owner_count(&self, agent: AgentId) -> usize {
        self.sectors.iter().filter(|s| s.owned.contains(&agent)).count()
    }

    /// Recompute per-sector visible sets
    pub fn refresh_visibility(&mut self, agents: impl Iterator<Item = (AgentId, Vec2)> + Clone) {
        let padding_sq = self.padding * self.padding;
        for sector in &mut self.sectors {
            sector.visible = agents
                .clone()
                .filter(|(_, p)| sector.rect.distance_squared_to(*p) <= padding_sq)
                .map(|(id, _)| id)
                .collect();
        }
    }

    /// Soft push away from canvas edges that have no neighboring sector
    ///
    /// Quadratic ramp from zero at `margin` px from the edge to `strength`
    /// on the edge.
    pub fn boundary_pressure(&self, p: Vec2, margin: f32, strength: f32) -> Vec2 {
        if margin <= 0.0 || !p.is_finite() {
            return Vec2::ZERO;
        }
        let rect = self.rect_at(p);
        let probe = 1.0;
        let edges = [
            (p.x - rect.x, Vec2::new(1.0, 0.0), Vec2::new(rect.x - probe, p.y)),
            (rect.right() - p.x, Vec2::new(-1.0, 0.0), Vec2::new(rect.right() + probe, p.y)),
            (p.y - rect.y, Vec2::new(0.0, 1.0), Vec2::new(p.x, rect.y - probe)),
            (rect.bottom() - p.y, Vec2::new(0.0, -1.0), Vec2::new(p.x, rect.bottom() + probe)),
        ];

        let mut force = Vec2::ZERO;
        for (distance, inward, beyond) in edges {
            if distance >= margin || self.contains(beyond) {
                continue;
            }
            let t = ((margin - distance) / margin).clamp(0.0, 1.0);
            force += inward * (strength * t * t);
        }
        force
    }
}
