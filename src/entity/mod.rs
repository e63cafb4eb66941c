pub mod agents;
pub mod behavior;
pub mod needs;
pub mod species;

pub use agents::{AgentArchetype, AgentSpawn};
pub use behavior::{BehaviorMachine, BehaviorState, Intent, TargetPlanner, Transition};
pub use needs::Needs;
pub use species::{DecorationKind, Species, SpeciesProfile};
