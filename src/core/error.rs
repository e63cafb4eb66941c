use thiserror::Error;

use crate::core::types::{AgentId, SchoolId};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Agent not found: {0:?}")]
    AgentNotFound(AgentId),

    #[error("School not found: {0:?}")]
    SchoolNotFound(SchoolId),

    #[error("No canvas geometry available: monitor query failed and fallback canvas is empty")]
    NoCanvasGeometry,

    #[error("Monitor query failed: {0}")]
    MonitorQuery(String),

    #[error("Event queue full")]
    QueueFull,

    #[error("Event queue closed")]
    QueueClosed,

    #[error("Invalid monitor specification: {0}")]
    InvalidMonitorSpec(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
