//! Needs that drive creature behavior

use serde::{Deserialize, Serialize};

use crate::core::config::BehaviorConfig;

/// Internal drives of one creature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Needs {
    /// 0.0 = fed, 1.0 = starving
    pub hunger: f32,
    /// 0.0 = miserable, 1.0 = content
    pub mood: f32,
    /// 0.0 = fresh, 1.0 = exhausted
    pub fatigue: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self {
            hunger: 0.0,
            mood: 1.0,
            fatigue: 0.0,
        }
    }
}

impl Needs {
    /// Advance needs by `dt` seconds
    ///
    /// `exertion` is the fraction of top speed the creature moved at this tick.
    pub fn decay(&mut self, dt: f32, exertion: f32, resting: bool, config: &BehaviorConfig) {
        self.hunger += config.hunger_rate * dt;

        if self.hunger > 0.7 {
            self.mood -= 0.015 * dt;
        } else if resting {
            self.mood += 0.005 * dt;
        } else if self.hunger < 0.3 {
            self.mood += 0.003 * dt;
        } else {
            self.mood += 0.001 * dt;
        }

        if resting {
            self.fatigue -= config.rest_recovery_rate * dt;
        } else {
            self.fatigue += config.fatigue_rate * exertion.clamp(0.0, 1.0) * dt;
        }

        self.clamp();
    }

    /// Eating a pellet
    pub fn feed(&mut self, amount: f32) {
        self.hunger -= amount;
        self.mood += amount * 0.5;
        self.clamp();
    }

    pub fn boost_mood(&mut self, amount: f32) {
        self.mood += amount;
        self.clamp();
    }

    /// Speed multiplier from mood: a content creature swims more briskly
    pub fn vigor(&self) -> f32 {
        0.7 + 0.6 * self.mood
    }

    fn clamp(&mut self) {
        self.hunger = self.hunger.clamp(0.0, 1.0);
        self.mood = self.mood.clamp(0.0, 1.0);
        self.fatigue = self.fatigue.clamp(0.0, 1.0);
    }
}
