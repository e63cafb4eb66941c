//! Tidepool - behavior and motion engine for a desktop aquarium overlay
//!
//! The engine owns a fixed-timestep world of fish agents swimming across a
//! multi-monitor canvas. A renderer drives it with [`ecs::World::advance`] and
//! draws [`simulation::WorldSnapshot`]s; everything else talks to it through
//! [`simulation::EventSender`].

pub mod core;
pub mod ecs;
pub mod entity;
pub mod motion;
pub mod simulation;
pub mod spatial;
