pub mod clock;
pub mod events;
pub mod exclusion;
pub mod exploration;
pub mod flocking;
pub mod growth;
pub mod pellets;
pub mod sectors;
pub mod snapshot;
pub mod tick;

pub use clock::SimulationClock;
pub use events::{CommandQueue, EngineCommand, EventSender, SimulationEvent};
pub use exclusion::{ExclusionZone, ExclusionZoneField, ZoneSchedule};
pub use flocking::{FlockCoordinator, FlockForces, School};
pub use growth::{GrowthEvent, GrowthSimulator};
pub use sectors::{MonitorProvider, SectorManager, StaticMonitors};
pub use snapshot::WorldSnapshot;
pub use tick::run_simulation_tick;
