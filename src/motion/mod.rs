//! Motion primitives: coherent noise and steering

pub mod noise;
pub mod steering;

pub use self::noise::NoiseSource;
pub use steering::{SteeringEngine, SteeringInput, SteeringOutput};
