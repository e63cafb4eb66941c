//! Per-agent behavioral state machine
//!
//! Each tick the machine looks at the agent's situation, takes at most one
//! transition, and then reports an [`Intent`]: where to go and how fast. The
//! steering layer turns the intent into motion; exclusion repulsion is added
//! there regardless of state, so no transition can drop it.

use serde::{Deserialize, Serialize};

use crate::core::config::BehaviorConfig;
use crate::core::types::{Rect, SimTime, Tick, Vec2};
use crate::entity::needs::Needs;
use crate::entity::species::SpeciesProfile;

/// Behavioral states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    Idle,
    Searching,
    Feeding,
    Resting,
    Darting,
    Flaring,
    SurfaceBreath,
    Communicating,
}

impl BehaviorState {
    /// States that hold position (display or rest)
    pub fn is_stationary(&self) -> bool {
        matches!(self, BehaviorState::Resting | BehaviorState::Flaring)
    }

    /// Whether a reachable pellet pulls the agent out of this state
    fn yields_to_food(&self) -> bool {
        matches!(
            self,
            BehaviorState::Idle
                | BehaviorState::Searching
                | BehaviorState::Darting
                | BehaviorState::Resting
        )
    }
}

/// A state change, reported once per tick at most
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: BehaviorState,
    pub to: BehaviorState,
}

/// Where the agent wants to go and how fast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intent {
    pub target: Option<Vec2>,
    pub desired_speed: f32,
}

/// Randomness and spatial queries the machine needs from the world
///
/// Kept behind a trait so the machine can be driven by scripted planners in
/// tests.
pub trait TargetPlanner {
    /// A fresh point to explore, favoring regions not visited recently
    fn exploration_target(&mut self, from: Vec2) -> Vec2;
    /// A gentle nearby point for idle drifting, if one is legal
    fn drift_target(&mut self, from: Vec2) -> Option<Vec2>;
    /// Uniform sample in [0, 1)
    fn roll(&mut self) -> f32;
    /// Idle dwell duration (seconds)
    fn dwell(&mut self) -> f32;
}

/// Read-only view of an agent's surroundings for one tick
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext<'a> {
    pub now: SimTime,
    pub tick: Tick,
    pub position: Vec2,
    pub needs: &'a Needs,
    /// Rectangle of the sector that owns the agent
    pub sector: Rect,
    /// True if the agent is inside an active exclusion zone or its margin
    pub near_exclusion: bool,
    /// Nearest reachable, unconsumed pellet
    pub nearest_pellet: Option<Vec2>,
    /// Shared roaming target when the agent belongs to a school
    pub school_target: Option<Vec2>,
    pub config: &'a BehaviorConfig,
}

/// State machine for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorMachine {
    state: BehaviorState,
    entered_at: SimTime,
    last_transition_tick: Option<Tick>,
    target: Option<Vec2>,
    dwell_until: SimTime,
    message_pending: bool,
    last_pellet_seen: SimTime,
    /// Whether the current search already spent its dart
    darted: bool,
    breath_origin_y: f32,
    last_breath_at: Option<SimTime>,
}

impl BehaviorMachine {
    /// New machine in Idle, first dwell ending at `dwell_until`
    pub fn new(now: SimTime, dwell_until: SimTime) -> Self {
        Self {
            state: BehaviorState::Idle,
            entered_at: now,
            last_transition_tick: None,
            target: None,
            dwell_until,
            message_pending: false,
            last_pellet_seen: now,
            darted: false,
            breath_origin_y: 0.0,
            last_breath_at: None,
        }
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    pub fn entered_at(&self) -> SimTime {
        self.entered_at
    }

    pub fn message_pending(&self) -> bool {
        self.message_pending
    }

    /// External "message pending" / "message dismissed" trigger
    pub fn set_message_pending(&mut self, pending: bool) {
        self.message_pending = pending;
    }

    /// Start searching toward a specific point
    pub fn enter_searching(&mut self, target: Vec2, now: SimTime, tick: Tick) -> Transition {
        self.darted = false;
        self.target = Some(target);
        self.enter(BehaviorState::Searching, now, tick)
    }

    fn enter(&mut self, to: BehaviorState, now: SimTime, tick: Tick) -> Transition {
        let from = self.state;
        self.state = to;
        self.entered_at = now;
        self.last_transition_tick = Some(tick);
        Transition { from, to }
    }

    fn enter_idle(&mut self, ctx: &BehaviorContext, planner: &mut dyn TargetPlanner) -> Transition {
        self.target = None;
        self.dwell_until = ctx.now + planner.dwell() as f64;
        self.enter(BehaviorState::Idle, ctx.now, ctx.tick)
    }

    fn enter_search(&mut self, ctx: &BehaviorContext, planner: &mut dyn TargetPlanner) -> Transition {
        let target = planner.exploration_target(ctx.position);
        self.enter_searching(target, ctx.now, ctx.tick)
    }

    fn hover_point(sector: Rect) -> Vec2 {
        Vec2::new(sector.center().x, sector.y + sector.height * 0.2)
    }

    fn can_breathe(&self, ctx: &BehaviorContext) -> bool {
        let near_top = ctx.position.y - ctx.sector.y < ctx.config.surface_band;
        let rested = self
            .last_breath_at
            .map_or(true, |t| ctx.now - t >= ctx.config.breath_cooldown as f64);
        near_top && rested
    }

    fn enter_breath(&mut self, ctx: &BehaviorContext) -> Transition {
        self.breath_origin_y = ctx.position.y;
        self.last_breath_at = Some(ctx.now);
        self.target = Some(Vec2::new(ctx.position.x, ctx.sector.y));
        self.enter(BehaviorState::SurfaceBreath, ctx.now, ctx.tick)
    }

    /// Take at most one transition for this tick
    pub fn evaluate(
        &mut self,
        ctx: &BehaviorContext,
        planner: &mut dyn TargetPlanner,
    ) -> Option<Transition> {
        if self.last_transition_tick == Some(ctx.tick) {
            return None;
        }
        let config = ctx.config;
        let elapsed = (ctx.now - self.entered_at) as f32;

        // External message trigger outranks everything else
        if self.message_pending && self.state != BehaviorState::Communicating {
            self.target = Some(Self::hover_point(ctx.sector));
            return Some(self.enter(BehaviorState::Communicating, ctx.now, ctx.tick));
        }

        if ctx.nearest_pellet.is_some() {
            self.last_pellet_seen = ctx.now;
        }
        if let Some(pellet) = ctx.nearest_pellet {
            if self.state.yields_to_food() {
                self.target = Some(pellet);
                return Some(self.enter(BehaviorState::Feeding, ctx.now, ctx.tick));
            }
        }

        match self.state {
            BehaviorState::Communicating => {
                if !self.message_pending {
                    return Some(self.enter_idle(ctx, planner));
                }
                if elapsed >= config.communicate_timeout {
                    tracing::debug!("Communication timed out without dismissal");
                    self.message_pending = false;
                    return Some(self.enter_idle(ctx, planner));
                }
                self.target = Some(Self::hover_point(ctx.sector));
                None
            }

            BehaviorState::Idle => {
                if ctx.needs.fatigue >= config.fatigue_threshold {
                    self.target = None;
                    return Some(self.enter(BehaviorState::Resting, ctx.now, ctx.tick));
                }
                if ctx.needs.hunger >= config.hunger_search_threshold {
                    return Some(self.enter_search(ctx, planner));
                }
                if self.can_breathe(ctx) && planner.roll() < config.breath_chance {
                    return Some(self.enter_breath(ctx));
                }
                if let Some(drift) = self.target {
                    if drift.distance(&ctx.position) <= config.arrival_radius {
                        self.target = None;
                    }
                }
                if ctx.now < self.dwell_until {
                    return None;
                }

                self.dwell_until = ctx.now + planner.dwell() as f64;
                let calm = ctx.needs.fatigue < config.fatigue_threshold * 0.5;
                if calm && !ctx.near_exclusion && planner.roll() < config.flare_chance {
                    self.target = None;
                    return Some(self.enter(BehaviorState::Flaring, ctx.now, ctx.tick));
                }
                if planner.roll() < config.drift_chance {
                    self.target = planner.drift_target(ctx.position);
                    return None;
                }
                Some(self.enter_search(ctx, planner))
            }

            BehaviorState::Searching => {
                let Some(target) = self.target else {
                    return Some(self.enter_idle(ctx, planner));
                };
                let distance = target.distance(&ctx.position);
                if distance <= config.arrival_radius || elapsed >= config.search_timeout {
                    return Some(self.enter_idle(ctx, planner));
                }
                if distance > config.dart_distance
                    && !self.darted
                    && ctx.needs.fatigue < config.fatigue_threshold
                {
                    self.darted = true;
                    return Some(self.enter(BehaviorState::Darting, ctx.now, ctx.tick));
                }
                if self.can_breathe(ctx) && planner.roll() < config.breath_chance {
                    return Some(self.enter_breath(ctx));
                }
                None
            }

            BehaviorState::Darting => {
                let reached = self
                    .target
                    .map_or(true, |t| t.distance(&ctx.position) <= config.arrival_radius);
                if reached {
                    return Some(self.enter_idle(ctx, planner));
                }
                if elapsed >= config.dart_duration {
                    return Some(self.enter(BehaviorState::Searching, ctx.now, ctx.tick));
                }
                None
            }

            BehaviorState::Feeding => {
                if let Some(pellet) = ctx.nearest_pellet {
                    self.target = Some(pellet);
                    return None;
                }
                self.target = None;
                if (ctx.now - self.last_pellet_seen) as f32 >= config.feeding_timeout {
                    return Some(self.enter_idle(ctx, planner));
                }
                None
            }

            BehaviorState::Resting => {
                if elapsed >= config.rest_min_duration
                    && ctx.needs.fatigue <= config.fatigue_recovered
                {
                    return Some(self.enter_idle(ctx, planner));
                }
                None
            }

            BehaviorState::Flaring => {
                if elapsed >= config.flare_duration {
                    return Some(self.enter_idle(ctx, planner));
                }
                None
            }

            BehaviorState::SurfaceBreath => {
                if elapsed >= config.breath_duration {
                    return Some(self.enter_idle(ctx, planner));
                }
                // Rise for the first half, sink back for the second
                let y = if elapsed < config.breath_duration * 0.5 {
                    ctx.sector.y
                } else {
                    self.breath_origin_y
                };
                self.target = Some(Vec2::new(ctx.position.x, y));
                None
            }
        }
    }

    /// Desired target and speed for the current state
    ///
    /// `speed_mult` is the agent's personal speed variation.
    pub fn intent(
        &self,
        ctx: &BehaviorContext,
        profile: &SpeciesProfile,
        speed_mult: f32,
    ) -> Intent {
        let cruise = profile.cruise_speed * speed_mult * ctx.needs.vigor();
        match self.state {
            BehaviorState::Idle => {
                let target = ctx.school_target.or(self.target);
                Intent {
                    target,
                    desired_speed: if target.is_some() { cruise * 0.5 } else { 0.0 },
                }
            }
            BehaviorState::Searching => Intent {
                target: self.target,
                desired_speed: cruise,
            },
            BehaviorState::Darting => Intent {
                target: self.target,
                desired_speed: cruise * ctx.config.dart_speed_multiplier,
            },
            BehaviorState::Feeding => Intent {
                target: self.target,
                desired_speed: cruise * 0.8,
            },
            BehaviorState::Resting | BehaviorState::Flaring => Intent {
                target: None,
                desired_speed: 0.0,
            },
            BehaviorState::SurfaceBreath => Intent {
                target: self.target,
                desired_speed: cruise * 0.7,
            },
            BehaviorState::Communicating => Intent {
                target: self.target,
                desired_speed: cruise * 0.5,
            },
        }
    }

    /// Flaring lifts mood a little each tick it lasts
    pub fn mood_bonus(&self, dt: f32) -> f32 {
        if self.state == BehaviorState::Flaring {
            0.02 * dt
        } else {
            0.0
        }
    }
}
