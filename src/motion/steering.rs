//! Steering: desired target + forces -> bounded heading and speed
//!
//! Heading never snaps: each tick it moves at most `turn_cap` radians along
//! the shortest arc. Speed never jumps: it follows the desired speed through
//! exponential smoothing. Degenerate input (coincident target, zero force,
//! non-finite numbers) produces a zero steering force instead of NaN.

use crate::core::config::MotionConfig;
use crate::core::types::{angle_delta, wrap_angle, Vec2, VECTOR_EPSILON};

/// Speeds below this with a zero target are snapped to rest
const REST_SNAP_SPEED: f32 = 0.01;

/// Pose and intent for one agent this tick
#[derive(Debug, Clone, Copy)]
pub struct SteeringInput {
    pub position: Vec2,
    pub heading: f32,
    pub speed: f32,
    /// Point the agent wants to reach, if any
    pub target: Option<Vec2>,
    /// Cruise speed requested by the behavior state (px/s)
    pub desired_speed: f32,
    /// Flock, repulsion and boundary forces (unitless, ~0..3)
    pub bias: Vec2,
    /// Per-agent ceiling (px/s)
    pub max_speed: f32,
    /// Maximum heading change for this tick (radians)
    pub turn_cap: f32,
    /// Noise wobble added to the heading change before clamping (radians)
    pub wobble: f32,
    pub dt: f32,
}

/// New pose for one agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringOutput {
    pub heading: f32,
    pub speed: f32,
    pub velocity: Vec2,
    /// Combined steering force that drove this update
    pub force: Vec2,
}

/// Converts intent into motion under turn-rate and speed limits
#[derive(Debug, Clone)]
pub struct SteeringEngine {
    speed_smoothing: f32,
    slowing_radius: f32,
}

impl SteeringEngine {
    pub fn new(speed_smoothing: f32, slowing_radius: f32) -> Self {
        Self {
            speed_smoothing: speed_smoothing.max(0.001),
            slowing_radius: slowing_radius.max(VECTOR_EPSILON),
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(config.speed_smoothing, config.slowing_radius)
    }

    /// Unit seek direction plus bias. Zero if nothing pulls the agent.
    pub fn steering_force(&self, input: &SteeringInput) -> Vec2 {
        let seek = match input.target {
            Some(target) if target.is_finite() && input.position.is_finite() => {
                let to_target = target - input.position;
                if to_target.length() > VECTOR_EPSILON {
                    to_target.normalize()
                } else {
                    Vec2::ZERO
                }
            }
            _ => Vec2::ZERO,
        };
        let bias = if input.bias.is_finite() {
            input.bias
        } else {
            Vec2::ZERO
        };
        seek + bias
    }

    pub fn steer(&self, input: &SteeringInput) -> SteeringOutput {
        let heading = wrap_angle(input.heading);
        let current_speed = if input.speed.is_finite() {
            input.speed.max(0.0)
        } else {
            0.0
        };
        let max_speed = if input.max_speed.is_finite() {
            input.max_speed.max(0.0)
        } else {
            0.0
        };
        let dt = if input.dt.is_finite() { input.dt.max(0.0) } else { 0.0 };
        let turn_cap = if input.turn_cap.is_finite() {
            input.turn_cap.max(0.0)
        } else {
            0.0
        };

        let force = self.steering_force(input);

        let (new_heading, target_speed) = match force.angle() {
            None => (heading, 0.0),
            Some(desired_heading) => {
                let wobble = if input.wobble.is_finite() { input.wobble } else { 0.0 };
                let wanted = angle_delta(heading, desired_heading) + wobble;
                let turn = wanted.clamp(-turn_cap, turn_cap);
                let new_heading = wrap_angle(heading + turn);

                // Slow down while facing away from where we want to go
                let remaining = angle_delta(new_heading, desired_heading).abs();
                let turn_factor = 0.35 + 0.65 * remaining.cos().max(0.0);

                // Arrive gently when the target itself is the pull
                let arrival_factor = match input.target {
                    Some(target) if input.bias.is_zero() => {
                        (target.distance(&input.position) / self.slowing_radius).min(1.0)
                    }
                    _ => 1.0,
                };

                // Pure forces (no state speed) still move the agent, in
                // proportion to how hard they push
                let desired = if input.desired_speed.is_finite() {
                    input.desired_speed.max(0.0)
                } else {
                    0.0
                };
                let bias_speed = input.bias.length().min(1.0) * max_speed * 0.5;
                let base = desired.max(if input.bias.is_finite() { bias_speed } else { 0.0 });

                (new_heading, (base * turn_factor * arrival_factor).min(max_speed))
            }
        };

        let alpha = 1.0 - (-dt / self.speed_smoothing).exp();
        let mut speed = current_speed + (target_speed - current_speed) * alpha;
        if target_speed == 0.0 && speed < REST_SNAP_SPEED {
            speed = 0.0;
        }
        speed = speed.clamp(0.0, max_speed);

        let velocity = Vec2::from_angle(new_heading) * speed;

        SteeringOutput {
            heading: new_heading,
            speed,
            velocity,
            force,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_at(position: Vec2, target: Option<Vec2>) -> SteeringInput {
        SteeringInput {
            position,
            heading: 0.0,
            speed: 0.0,
            target,
            desired_speed: 60.0,
            bias: Vec2::ZERO,
            max_speed: 120.0,
            turn_cap: 0.1,
            wobble: 0.0,
            dt: 1.0 / 30.0,
        }
    }

    #[test]
    fn test_coincident_target_gives_zero_velocity() {
        let engine = SteeringEngine::new(0.35, 80.0);
        let p = Vec2::new(100.0, 100.0);
        let out = engine.steer(&input_at(p, Some(p)));

        assert_eq!(out.force, Vec2::ZERO);
        assert_eq!(out.velocity, Vec2::ZERO);
        assert_eq!(out.speed, 0.0);
        assert!(out.heading.is_finite());
    }

    #[test]
    fn test_turn_is_capped() {
        let engine = SteeringEngine::new(0.35, 80.0);
        // Target directly behind
        let mut input = input_at(Vec2::new(0.0, 0.0), Some(Vec2::new(-500.0, 0.0)));
        input.wobble = 0.3;
        let out = engine.steer(&input);
        assert!(angle_delta(0.0, out.heading).abs() <= 0.1 + 1e-6);
    }

    #[test]
    fn test_speed_is_smoothed_not_set() {
        let engine = SteeringEngine::new(0.35, 80.0);
        let input = input_at(Vec2::new(0.0, 0.0), Some(Vec2::new(1000.0, 0.0)));
        let out = engine.steer(&input);
        assert!(out.speed > 0.0);
        assert!(out.speed < 60.0 * 0.2, "speed jumped to {}", out.speed);
    }

    #[test]
    fn test_speed_converges_toward_desired() {
        let engine = SteeringEngine::new(0.35, 80.0);
        let mut input = input_at(Vec2::new(0.0, 0.0), Some(Vec2::new(100_000.0, 0.0)));
        for _ in 0..300 {
            let out = engine.steer(&input);
            input.speed = out.speed;
            input.heading = out.heading;
        }
        assert!((input.speed - 60.0).abs() < 1.0);
    }

    #[test]
    fn test_speed_never_exceeds_max() {
        let engine = SteeringEngine::new(0.01, 80.0);
        let mut input = input_at(Vec2::new(0.0, 0.0), Some(Vec2::new(100_000.0, 0.0)));
        input.desired_speed = 10_000.0;
        input.speed = 500.0;
        let out = engine.steer(&input);
        assert!(out.speed <= input.max_speed);
    }

    #[test]
    fn test_bias_alone_moves_agent() {
        let engine = SteeringEngine::new(0.35, 80.0);
        let mut input = input_at(Vec2::new(0.0, 0.0), None);
        input.desired_speed = 0.0;
        input.bias = Vec2::new(0.0, 3.0);
        let out = engine.steer(&input);
        assert!(out.speed > 0.0);
        assert!(out.heading > 0.0);
    }

    #[test]
    fn test_non_finite_input_is_contained() {
        let engine = SteeringEngine::new(0.35, 80.0);
        let mut input = input_at(Vec2::new(f32::NAN, 0.0), Some(Vec2::new(10.0, 0.0)));
        input.bias = Vec2::new(f32::INFINITY, 0.0);
        input.speed = f32::NAN;
        let out = engine.steer(&input);
        assert!(out.velocity.is_finite());
        assert!(out.heading.is_finite());
        assert_eq!(out.speed, 0.0);
    }

    #[test]
    fn test_stops_when_no_force() {
        let engine = SteeringEngine::new(0.35, 80.0);
        let mut input = input_at(Vec2::new(10.0, 10.0), None);
        input.speed = 50.0;
        for _ in 0..400 {
            let out = engine.steer(&input);
            input.speed = out.speed;
        }
        assert_eq!(input.speed, 0.0);
    }
}
