//! Fixed-timestep simulation clock

use crate::core::types::{SimTime, Tick};

/// Owns the authoritative tick counter
///
/// Real elapsed time is accumulated and converted into whole fixed steps, so
/// simulation speed does not depend on how often the display asks for frames.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    dt: f64,
    max_catch_up: u32,
    accumulator: f64,
    tick: Tick,
    dropped: u64,
}

impl SimulationClock {
    pub fn new(tick_rate_hz: f32, max_catch_up: u32) -> Self {
        let hz = if tick_rate_hz.is_finite() { tick_rate_hz.max(1.0) } else { 30.0 };
        Self {
            dt: 1.0 / hz as f64,
            max_catch_up: max_catch_up.max(1),
            accumulator: 0.0,
            tick: 0,
            dropped: 0,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt as f32
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Simulated seconds since start
    pub fn elapsed(&self) -> SimTime {
        self.tick as f64 * self.dt
    }

    /// Ticks discarded because the caller fell too far behind
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped
    }

    /// Add real time and return how many fixed steps to run now
    pub fn accumulate(&mut self, real_elapsed: f64) -> u32 {
        if !real_elapsed.is_finite() || real_elapsed <= 0.0 {
            return 0;
        }
        self.accumulator += real_elapsed;

        // Small tolerance so 1.0 s at 30 Hz is 30 steps, not 29
        let due = ((self.accumulator + 1e-9) / self.dt).floor();
        if due > self.max_catch_up as f64 {
            let dropped = due as u64 - self.max_catch_up as u64;
            tracing::warn!(dropped, "Simulation fell behind, dropping backlog");
            self.dropped += dropped;
            self.accumulator = 0.0;
            return self.max_catch_up;
        }
        self.accumulator = (self.accumulator - due * self.dt).max(0.0);
        due as u32
    }

    /// Record one completed tick
    pub fn advance(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }
}
