//! Inbound commands and outbound simulation events
//!
//! External producers hold an [`EventSender`] and never block; the world drains
//! its [`CommandQueue`] once at the start of every tick.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::core::error::{EngineError, Result};
use crate::core::types::{AgentId, DecorationId, PelletId, Rect, SchoolId, SectorId, Tick, Vec2};
use crate::entity::behavior::BehaviorState;
use crate::entity::species::Species;
use crate::simulation::exclusion::ExclusionZone;

/// Default bound on queued commands
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands from collaborators outside the core
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    DropPellet { position: Vec2 },
    ReplaceZones(Vec<ExclusionZone>),
    ToggleSanctuary,
    AddMonitorZone(usize),
    ClearZones,
    MonitorsChanged(Vec<Rect>),
    /// `None` addresses the primary agent (lowest id)
    MessagePending { agent: Option<AgentId> },
    MessageDismissed { agent: Option<AgentId> },
    SwitchSpecies { species: Species, count: u32 },
    ResizeSchool { school: SchoolId, count: u32 },
    SetLeafEnabled(bool),
}

/// Events generated during a simulation tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    StateChanged {
        agent: AgentId,
        from: BehaviorState,
        to: BehaviorState,
        tick: Tick,
    },
    SectorHandoff {
        agent: AgentId,
        from: SectorId,
        to: SectorId,
        tick: Tick,
    },
    PelletConsumed {
        agent: AgentId,
        pellet: PelletId,
        tick: Tick,
    },
    PelletExpired {
        pellet: PelletId,
    },
    PlantTrimmed {
        decoration: DecorationId,
        tick: Tick,
    },
    LeavesEmitted {
        count: u32,
        tick: Tick,
    },
    TopologyRebuilt {
        sectors: usize,
        fallback: bool,
    },
    PopulationChanged {
        species: Species,
        count: usize,
    },
    /// A non-finite pose was computed and the previous pose restored
    PoseReverted {
        agent: AgentId,
        tick: Tick,
    },
    CommandRejected {
        reason: String,
    },
}

/// Producer handle; cheap to clone
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<EngineCommand>,
}

impl EventSender {
    /// Enqueue without blocking
    pub fn try_send(&self, command: EngineCommand) -> Result<()> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::QueueFull,
            TrySendError::Closed(_) => EngineError::QueueClosed,
        })
    }

    /// Enqueue, waiting for room (for async producers)
    pub async fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| EngineError::QueueClosed)
    }
}

/// Consumer side, owned by the world
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::Receiver<EngineCommand>,
    tx: mpsc::Sender<EngineCommand>,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { rx, tx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Everything queued right now, in FIFO order
    pub fn drain(&mut self) -> Vec<EngineCommand> {
        let mut commands = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        commands
    }
}
