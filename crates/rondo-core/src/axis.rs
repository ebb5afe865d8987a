//! Per-axis simulated state machine.
//!
//! A `SimAxis` owns one axis's kinematic and logical state: hard travel
//! limits, home position, encoder offset, the in-flight route, and the
//! deferred-move buffer. Commands retarget the route; `poll` advances it
//! by elapsed simulated time and reacts to home-sensor and limit
//! crossings before deriving the published status flags.

use crate::error::{MotionError, Result};
use crate::route::{MotionLimits, Replan, Route, RoutePoint};
use serde::{Deserialize, Serialize};

const DEFAULT_ACCELERATION: f64 = 1.0;
const DEFAULT_VELOCITY: f64 = 1.0;

/// Creation-time geometry for one axis, in the engine's internal frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub low_limit: f64,
    pub high_limit: f64,
    pub home: f64,
    pub start: f64,
}

/// Discrete axis phase. `Homing` implies motion and `Idle` implies rest,
/// so combinations like "homing and done" cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisState {
    Idle,
    Moving,
    Homing,
}

/// Flags derived from the latest sample. Recomputed on every poll, never
/// a source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub moving: bool,
    pub done: bool,
    /// Last known direction of travel; retained while stationary.
    pub direction_positive: bool,
    pub at_high_limit: bool,
    pub at_low_limit: bool,
    pub at_home: bool,
}

/// A move buffered while the controller's deferred gate is set. Stored as
/// requested; relative targets resolve against the position at commit
/// time.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DeferredMove {
    target: f64,
    relative: bool,
}

pub struct SimAxis {
    index: usize,
    low_limit: f64,
    high_limit: f64,
    home: f64,
    /// Maps internal to reported coordinates: reported = internal + offset.
    offset: f64,
    route: Route,
    state: AxisState,
    replan: Replan,
    deferring: bool,
    deferred: Option<DeferredMove>,
    flags: StatusFlags,
}

impl SimAxis {
    pub fn new(index: usize, config: AxisConfig) -> Result<Self> {
        if !(config.low_limit < config.high_limit) {
            return Err(MotionError::InvalidLimits {
                low: config.low_limit,
                high: config.high_limit,
            });
        }
        let route = Route::new(
            config.start,
            MotionLimits {
                acceleration: DEFAULT_ACCELERATION,
                velocity: DEFAULT_VELOCITY,
            },
        );
        let mut axis = Self {
            index,
            low_limit: config.low_limit,
            high_limit: config.high_limit,
            home: config.home,
            offset: 0.0,
            route,
            state: AxisState::Idle,
            replan: Replan::Continue,
            deferring: false,
            deferred: None,
            flags: StatusFlags {
                moving: false,
                done: true,
                direction_positive: true,
                at_high_limit: false,
                at_low_limit: false,
                at_home: false,
            },
        };
        let point = axis.route.current();
        axis.derive_flags(point);
        Ok(axis)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> AxisState {
        self.state
    }

    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    pub fn limits(&self) -> MotionLimits {
        self.route.limits()
    }

    pub fn home_position(&self) -> f64 {
        self.home
    }

    pub fn low_limit(&self) -> f64 {
        self.low_limit
    }

    pub fn high_limit(&self) -> f64 {
        self.high_limit
    }

    /// Position in the externally reported frame.
    pub fn reported_position(&self) -> f64 {
        self.route.current().position + self.offset
    }

    /// Single-encoder model: the encoder reads the reported position.
    pub fn encoder_position(&self) -> f64 {
        self.reported_position()
    }

    pub fn velocity(&self) -> f64 {
        self.route.current().velocity
    }

    pub fn has_deferred_move(&self) -> bool {
        self.deferred.is_some()
    }

    /// Request a positional move. Fails with `LimitViolation` only when
    /// the axis already sits at or beyond a hard limit and the target
    /// points further outward; an out-of-range target from an in-range
    /// position is accepted and clamped reactively by a later poll.
    ///
    /// While the controller's deferred gate is set the request is
    /// buffered instead and the endpoint is left untouched.
    ///
    /// Nonzero `max_velocity`/`acceleration` replace the axis caps;
    /// `_min_velocity` (base velocity) is accepted for interface fidelity
    /// but not modelled.
    pub fn move_to(
        &mut self,
        position: f64,
        relative: bool,
        _min_velocity: f64,
        max_velocity: f64,
        acceleration: f64,
    ) -> Result<()> {
        let target = self.resolve_target(position, relative);
        self.check_move_target(target)?;
        if self.deferring {
            self.deferred = Some(DeferredMove {
                target: position,
                relative,
            });
            return Ok(());
        }
        self.apply_move(target, max_velocity, acceleration);
        Ok(())
    }

    /// Ramp to a constant velocity (a jog). A nonzero `velocity` becomes
    /// the axis velocity cap; a nonzero `acceleration` replaces the
    /// acceleration cap. Fails with `LimitViolation` when the axis sits
    /// at or beyond a hard limit and `velocity` points further outward.
    pub fn set_velocity(&mut self, velocity: f64, acceleration: f64) -> Result<()> {
        let position = self.route.current().position;
        if (position >= self.high_limit && velocity > 0.0)
            || (position <= self.low_limit && velocity < 0.0)
        {
            return Err(MotionError::LimitViolation {
                index: self.index,
                position,
            });
        }
        self.override_limits(velocity.abs(), acceleration);
        self.retarget_velocity(velocity);
        self.state = AxisState::Moving;
        Ok(())
    }

    /// Start a homing search: jog at the velocity cap toward positive
    /// (`forwards`) or negative travel. The search ends when a poll
    /// detects a home-sensor crossing, which retargets the exact home
    /// position; hitting a hard limit first reverses the search.
    pub fn home(
        &mut self,
        _min_velocity: f64,
        max_velocity: f64,
        acceleration: f64,
        forwards: bool,
    ) -> Result<()> {
        let speed = if max_velocity > 0.0 {
            max_velocity
        } else {
            self.route.limits().velocity
        };
        let velocity = if forwards { speed } else { -speed };
        let position = self.route.current().position;
        if (position >= self.high_limit && velocity > 0.0)
            || (position <= self.low_limit && velocity < 0.0)
        {
            return Err(MotionError::LimitViolation {
                index: self.index,
                position,
            });
        }
        self.override_limits(max_velocity, acceleration);
        self.retarget_velocity(velocity);
        self.state = AxisState::Homing;
        Ok(())
    }

    /// Ramp to rest and discard any buffered deferred move.
    pub fn stop(&mut self, acceleration: f64) {
        self.deferred = None;
        self.override_limits(0.0, acceleration);
        self.retarget_velocity(0.0);
        self.state = AxisState::Moving;
    }

    /// Recalibrate the reported frame so the current position reads as
    /// `position`. The continuous state is untouched.
    pub fn set_position(&mut self, position: f64) {
        self.offset = position - self.route.current().position;
    }

    /// Replace limits, home, and offset outright and park the axis at
    /// `start`. Test-fixture entry point, not a normal runtime call.
    pub fn reconfigure(&mut self, config: AxisConfig) -> Result<()> {
        if !(config.low_limit < config.high_limit) {
            return Err(MotionError::InvalidLimits {
                low: config.low_limit,
                high: config.high_limit,
            });
        }
        self.low_limit = config.low_limit;
        self.high_limit = config.high_limit;
        self.home = config.home;
        self.offset = 0.0;
        self.deferred = None;
        self.state = AxisState::Idle;
        self.replan = Replan::Continue;
        self.route.reset_to(config.start);
        let point = self.route.current();
        self.derive_flags(point);
        Ok(())
    }

    /// Replace the kinematic caps. Non-positive components are ignored.
    /// Configuration-time call; an in-flight profile replans on the next
    /// poll.
    pub fn set_limits(&mut self, limits: MotionLimits) {
        self.override_limits(limits.velocity, limits.acceleration);
    }

    /// Advance by `elapsed` simulated seconds and return whether the axis
    /// is still in motion. Safe with `elapsed == 0` (no state change) and
    /// with arbitrarily large values (the profile settles immediately).
    pub fn poll(&mut self, elapsed: f64) -> bool {
        self.process(elapsed);
        self.flags.moving
    }

    fn process(&mut self, elapsed: f64) {
        let prev = self.route.current().position;
        let mode = self.replan;
        self.replan = Replan::Continue;
        let point = self.route.advance(elapsed, mode);

        // Crossing checks run against the same new sample in a fixed
        // order; the home test wins while homing.
        if self.state == AxisState::Homing
            && (prev - self.home) * (point.position - self.home) <= 0.0
        {
            // Crossed (or landed on) the home sensor: the search is over;
            // stop on the exact home position.
            self.state = AxisState::Moving;
            self.route.set_endpoint(self.home, 0.0);
            self.replan = Replan::Restart;
        } else if point.position > self.high_limit && point.velocity > 0.0 {
            if self.state == AxisState::Homing {
                // Limit reached before the sensor: search the other way.
                self.retarget_velocity(-point.velocity);
            } else {
                self.route.set_endpoint(self.high_limit, 0.0);
                self.replan = Replan::Restart;
            }
        } else if point.position < self.low_limit && point.velocity < 0.0 {
            if self.state == AxisState::Homing {
                self.retarget_velocity(-point.velocity);
            } else {
                self.route.set_endpoint(self.low_limit, 0.0);
                self.replan = Replan::Restart;
            }
        }

        // Zero velocity with no profile left and nothing commit-ready is
        // the termination condition. A gated deferred move does not keep
        // the axis "moving".
        let commit_ready = self.deferred.is_some() && !self.deferring;
        if point.velocity == 0.0 && !self.route.profile_pending() && !commit_ready {
            self.state = AxisState::Idle;
        }

        self.derive_flags(point);

        // A deferred move left behind after the gate dropped commits as
        // an ordinary move.
        if !self.deferring {
            self.commit_deferred();
        }
    }

    fn derive_flags(&mut self, point: RoutePoint) {
        if point.velocity > 0.0 {
            self.flags.direction_positive = true;
        } else if point.velocity < 0.0 {
            self.flags.direction_positive = false;
        }
        self.flags.done = self.state == AxisState::Idle;
        self.flags.moving = !self.flags.done;
        self.flags.at_high_limit = point.position >= self.high_limit;
        self.flags.at_low_limit = point.position <= self.low_limit;
        // Home is a commanded stopping point, not a tolerance band.
        self.flags.at_home = point.position == self.home;
    }

    fn resolve_target(&self, position: f64, relative: bool) -> f64 {
        if relative {
            // Relative to the reported position; the offset cancels in
            // the internal frame.
            self.route.current().position + position
        } else {
            position - self.offset
        }
    }

    fn check_move_target(&self, target: f64) -> Result<()> {
        let position = self.route.current().position;
        if (position >= self.high_limit && target > position)
            || (position <= self.low_limit && target < position)
        {
            return Err(MotionError::LimitViolation {
                index: self.index,
                position,
            });
        }
        Ok(())
    }

    fn apply_move(&mut self, target: f64, max_velocity: f64, acceleration: f64) {
        self.override_limits(max_velocity, acceleration);
        self.route.set_endpoint(target, 0.0);
        self.replan = Replan::Restart;
        self.state = AxisState::Moving;
    }

    /// Plan a jog toward `velocity`: one bounded ramp whose advisory
    /// endpoint is extrapolated from the ramp time, so the subsequent
    /// advance reaches the requested velocity smoothly.
    fn retarget_velocity(&mut self, velocity: f64) {
        let limits = self.route.limits();
        let target = velocity.clamp(-limits.velocity, limits.velocity);
        let point = self.route.current();
        let ramp = (target - point.velocity).abs() / limits.acceleration;
        let end = point.position + 0.5 * (point.velocity + target) * ramp;
        self.route.set_endpoint(end, target);
        self.replan = Replan::Restart;
    }

    /// Nonzero components replace the axis caps; zero leaves them alone.
    fn override_limits(&mut self, velocity: f64, acceleration: f64) {
        let mut limits = self.route.limits();
        let mut changed = false;
        if velocity > 0.0 {
            limits.velocity = velocity;
            changed = true;
        }
        if acceleration > 0.0 {
            limits.acceleration = acceleration;
            changed = true;
        }
        if changed {
            self.route.set_limits(limits);
            self.replan = Replan::Restart;
        }
    }

    pub(crate) fn set_deferring(&mut self, deferring: bool) {
        self.deferring = deferring;
    }

    pub(crate) fn commit_deferred(&mut self) {
        if let Some(deferred) = self.deferred.take() {
            let target = self.resolve_target(deferred.target, deferred.relative);
            // Revalidated as an ordinary move; a target that became
            // illegal while buffered is dropped.
            if self.check_move_target(target).is_ok() {
                self.apply_move(target, 0.0, 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> SimAxis {
        SimAxis::new(
            0,
            AxisConfig {
                low_limit: 0.0,
                high_limit: 100.0,
                home: 0.0,
                start: 50.0,
            },
        )
        .unwrap()
    }

    fn settle(axis: &mut SimAxis, dt: f64) {
        for _ in 0..500 {
            if !axis.poll(dt) {
                return;
            }
        }
        panic!("axis failed to settle");
    }

    #[test]
    fn move_to_high_limit_settles_exactly() {
        let mut a = axis();
        a.move_to(100.0, false, 0.0, 10.0, 5.0).unwrap();
        settle(&mut a, 1.0);
        assert_eq!(a.reported_position(), 100.0);
        assert_eq!(a.state(), AxisState::Idle);
        let flags = a.flags();
        assert!(flags.at_high_limit);
        assert!(!flags.moving);
        assert!(flags.done);
    }

    #[test]
    fn out_of_range_target_is_accepted_then_clamped() {
        let mut a = axis();
        // 50 is not at a limit, so the move is accepted optimistically.
        a.move_to(200.0, false, 0.0, 10.0, 5.0).unwrap();
        settle(&mut a, 1.0);
        assert_eq!(a.reported_position(), 100.0);
        assert!(a.flags().at_high_limit);
    }

    #[test]
    fn reverse_home_crosses_and_settles_on_home() {
        let mut a = axis();
        a.home(0.0, 10.0, 5.0, false).unwrap();
        assert_eq!(a.state(), AxisState::Homing);
        let mut crossed = false;
        for _ in 0..100 {
            let moving = a.poll(1.0);
            if a.state() != AxisState::Homing {
                crossed = true;
            }
            if !moving {
                break;
            }
        }
        assert!(crossed);
        assert_eq!(a.reported_position(), 0.0);
        assert!(a.flags().at_home);
        assert!(a.flags().done);
    }

    #[test]
    fn homing_reverses_at_the_far_limit() {
        // Searching away from home runs into the high limit first; the
        // search reverses and still finds home.
        let mut a = axis();
        a.home(0.0, 10.0, 5.0, true).unwrap();
        let mut reversed = false;
        for _ in 0..200 {
            let moving = a.poll(0.5);
            if a.state() == AxisState::Homing && a.velocity() < 0.0 {
                reversed = true;
            }
            if !moving {
                break;
            }
        }
        assert!(reversed);
        assert_eq!(a.reported_position(), 0.0);
        assert!(a.flags().at_home);
    }

    #[test]
    fn velocity_ramp_follows_acceleration() {
        let mut a = SimAxis::new(
            0,
            AxisConfig {
                low_limit: -1000.0,
                high_limit: 1000.0,
                home: 0.0,
                start: 10.0,
            },
        )
        .unwrap();
        a.set_velocity(5.0, 2.0).unwrap();
        a.poll(1.0);
        assert_eq!(a.velocity(), 2.0);
        a.poll(1.0);
        assert_eq!(a.velocity(), 4.0);
        a.poll(1.0);
        assert_eq!(a.velocity(), 5.0);
        a.poll(5.0);
        assert_eq!(a.velocity(), 5.0);
        assert!(a.flags().moving);
    }

    #[test]
    fn poll_zero_changes_nothing() {
        let mut a = axis();
        a.move_to(80.0, false, 0.0, 10.0, 5.0).unwrap();
        a.poll(1.0);
        let position = a.reported_position();
        let velocity = a.velocity();
        let flags = a.flags();
        for _ in 0..5 {
            a.poll(0.0);
            assert_eq!(a.reported_position(), position);
            assert_eq!(a.velocity(), velocity);
            assert_eq!(a.flags(), flags);
        }
    }

    #[test]
    fn set_position_round_trips() {
        let mut a = axis();
        a.set_position(123.25);
        assert_eq!(a.reported_position(), 123.25);
        assert_eq!(a.encoder_position(), 123.25);
    }

    #[test]
    fn relative_move_is_relative_to_reported_frame() {
        let mut a = axis();
        a.set_position(0.0);
        a.move_to(10.0, true, 0.0, 10.0, 5.0).unwrap();
        settle(&mut a, 1.0);
        assert_eq!(a.reported_position(), 10.0);
    }

    #[test]
    fn outward_move_from_limit_is_rejected() {
        let mut a = axis();
        a.move_to(100.0, false, 0.0, 10.0, 5.0).unwrap();
        settle(&mut a, 1.0);
        assert!(matches!(
            a.move_to(105.0, false, 0.0, 0.0, 0.0),
            Err(MotionError::LimitViolation { .. })
        ));
        assert!(matches!(
            a.set_velocity(5.0, 0.0),
            Err(MotionError::LimitViolation { .. })
        ));
        // Back toward range is always permitted.
        a.move_to(90.0, false, 0.0, 0.0, 0.0).unwrap();
        settle(&mut a, 1.0);
        assert_eq!(a.reported_position(), 90.0);
    }

    #[test]
    fn stop_discards_deferred_move() {
        let mut a = axis();
        a.set_deferring(true);
        a.move_to(80.0, false, 0.0, 10.0, 5.0).unwrap();
        assert!(a.has_deferred_move());
        a.stop(0.0);
        assert!(!a.has_deferred_move());
        settle(&mut a, 1.0);
        assert_eq!(a.reported_position(), 50.0);
    }

    #[test]
    fn direction_flag_is_retained_while_stationary() {
        let mut a = axis();
        a.move_to(40.0, false, 0.0, 10.0, 5.0).unwrap();
        settle(&mut a, 1.0);
        assert!(!a.flags().direction_positive);
        assert!(!a.flags().moving);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let config = AxisConfig {
            low_limit: 5.0,
            high_limit: 5.0,
            home: 0.0,
            start: 0.0,
        };
        assert!(matches!(
            SimAxis::new(0, config),
            Err(MotionError::InvalidLimits { .. })
        ));
        let mut a = axis();
        assert!(a.reconfigure(config).is_err());
    }

    #[test]
    fn reconfigure_replaces_geometry_outright() {
        let mut a = axis();
        a.set_position(7.0);
        a.reconfigure(AxisConfig {
            low_limit: -10.0,
            high_limit: 10.0,
            home: 2.0,
            start: 2.0,
        })
        .unwrap();
        assert_eq!(a.reported_position(), 2.0);
        assert!(a.flags().at_home);
        assert_eq!(a.state(), AxisState::Idle);
    }

    #[test]
    fn velocity_never_exceeds_cap_under_irregular_polls() {
        let mut a = axis();
        a.move_to(100.0, false, 0.0, 8.0, 3.0).unwrap();
        let intervals = [0.1, 0.7, 0.0, 1.3, 0.05, 2.0, 0.4];
        let mut last_v = 0.0;
        let mut last_t = 0.0;
        let mut t = 0.0;
        for _ in 0..40 {
            for dt in intervals {
                t += dt;
                a.poll(dt);
                let v = a.velocity();
                assert!(v.abs() <= 8.0 + 1e-9);
                if t > last_t {
                    assert!((v - last_v).abs() <= 3.0 * (t - last_t) + 1e-9);
                }
                last_v = v;
                last_t = t;
            }
        }
        assert_eq!(a.reported_position(), 100.0);
    }
}
