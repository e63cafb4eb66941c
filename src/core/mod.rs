pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigAdjustment, EngineConfig};
pub use error::{EngineError, Result};
