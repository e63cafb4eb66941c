//! Read-only per-tick view for renderers

use serde::{Deserialize, Serialize};

use crate::core::types::{AgentId, DecorationId, PelletId, Rect, SchoolId, SectorId, SimTime, Tick, Vec2};
use crate::entity::behavior::BehaviorState;
use crate::entity::species::{DecorationKind, Species};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPose {
    pub id: AgentId,
    pub species: Species,
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    pub state: BehaviorState,
    pub school: Option<SchoolId>,
    pub sector: SectorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorView {
    pub id: SectorId,
    pub rect: Rect,
    pub owned: Vec<AgentId>,
    pub visible: Vec<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecorationView {
    pub id: DecorationId,
    pub kind: DecorationKind,
    pub anchor: Vec2,
    pub growth: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PelletView {
    pub id: PelletId,
    pub position: Vec2,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: Tick,
    pub time: SimTime,
    pub agents: Vec<AgentPose>,
    pub sectors: Vec<SectorView>,
    pub decorations: Vec<DecorationView>,
    pub leaves: Vec<Vec2>,
    pub pellets: Vec<PelletView>,
    pub zones: Vec<Rect>,
    pub sanctuary_enabled: bool,
    pub eye_tracking_damping: f32,
}

impl WorldSnapshot {
    pub fn agent(&self, id: AgentId) -> Option<&AgentPose> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn to_json(&self) -> crate::core::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
