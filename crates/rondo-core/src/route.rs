//! Bounded-acceleration route planning for a single axis.
//!
//! A `Route` drives the current kinematic sample toward an endpoint along
//! a trapezoidal (or triangular) velocity profile. Profiles are planned as
//! a short queue of constant-acceleration segments and integrated in
//! closed form, so advancing by any elapsed time is exact; when the
//! profile runs out the sample lands exactly on a zero-velocity endpoint,
//! or keeps coasting at a nonzero endpoint velocity (a jog).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kinematic caps for an axis. Both values are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    /// Maximum acceleration magnitude (units/s²).
    pub acceleration: f64,
    /// Maximum velocity magnitude (units/s).
    pub velocity: f64,
}

/// A sampled kinematic state: where the axis is (or should end up) at `time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub time: f64,
    pub position: f64,
    pub velocity: f64,
}

/// Whether the next advance keeps the in-flight profile or rebuilds it
/// from the current sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replan {
    /// Interpolate further along the existing profile.
    Continue,
    /// The endpoint or the limits changed; discard the in-flight profile
    /// and replan from the current instantaneous state.
    Restart,
}

/// One constant-acceleration slice of a profile.
#[derive(Debug, Clone, Copy, Default)]
struct Segment {
    duration: f64,
    start_pos: f64,
    start_vel: f64,
    accel: f64,
}

impl Segment {
    fn velocity_at(&self, t: f64) -> f64 {
        self.start_vel + self.accel * t
    }

    fn position_at(&self, t: f64) -> f64 {
        self.start_pos + (self.start_vel + 0.5 * self.accel * t) * t
    }
}

/// Per-axis trajectory generator.
pub struct Route {
    limits: MotionLimits,
    endpoint: RoutePoint,
    current: RoutePoint,
    segments: VecDeque<Segment>,
    seg_elapsed: f64,
}

impl Route {
    pub fn new(start_position: f64, limits: MotionLimits) -> Self {
        debug_assert!(limits.acceleration > 0.0 && limits.velocity > 0.0);
        let point = RoutePoint {
            time: 0.0,
            position: start_position,
            velocity: 0.0,
        };
        Self {
            limits,
            endpoint: point,
            current: point,
            segments: VecDeque::new(),
            seg_elapsed: 0.0,
        }
    }

    /// The most recently computed sample, i.e. simulated "now".
    pub fn current(&self) -> RoutePoint {
        self.current
    }

    /// The endpoint the profile is driving toward. For a jog the position
    /// is advisory (the ramp's end); `time` is the predicted arrival.
    pub fn endpoint(&self) -> RoutePoint {
        self.endpoint
    }

    pub fn limits(&self) -> MotionLimits {
        self.limits
    }

    /// True while planned profile segments remain to be integrated. A
    /// brake-and-return profile passes through velocity zero mid-way;
    /// this distinguishes that cusp from actual arrival.
    pub fn profile_pending(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Caller must pair this with a `Replan::Restart` on the next advance.
    pub fn set_limits(&mut self, limits: MotionLimits) {
        debug_assert!(limits.acceleration > 0.0 && limits.velocity > 0.0);
        self.limits = limits;
    }

    /// Retarget the profile. Takes effect on the next advance with
    /// `Replan::Restart`; the current sample is untouched.
    pub fn set_endpoint(&mut self, position: f64, velocity: f64) {
        self.endpoint.position = position;
        self.endpoint.velocity = velocity;
        self.endpoint.time = self.current.time;
    }

    /// Forget all motion and park the sample at `position`. Time keeps
    /// running; velocity drops to zero.
    pub fn reset_to(&mut self, position: f64) {
        self.current.position = position;
        self.current.velocity = 0.0;
        self.endpoint = self.current;
        self.segments.clear();
        self.seg_elapsed = 0.0;
    }

    /// Advance the sample by `elapsed` simulated seconds and return it.
    ///
    /// With `Replan::Restart` the profile is first re-derived from the
    /// current sample, so a reversal mid-flight decelerates through zero
    /// instead of jumping; velocity never changes faster than the
    /// acceleration cap allows. `elapsed == 0` returns the current sample
    /// with only the time field touched.
    pub fn advance(&mut self, elapsed: f64, replan: Replan) -> RoutePoint {
        debug_assert!(elapsed >= 0.0);
        if replan == Replan::Restart {
            self.rebuild();
        }
        self.current.time += elapsed;
        let mut rem = elapsed;
        while rem > 0.0 {
            let Some(seg) = self.segments.front().copied() else {
                // Profile exhausted: hold a zero-velocity endpoint exactly,
                // or coast at the endpoint velocity (jog).
                if self.endpoint.velocity == 0.0 {
                    self.current.position = self.endpoint.position;
                    self.current.velocity = 0.0;
                } else {
                    self.current.velocity = self.endpoint.velocity;
                    self.current.position += self.endpoint.velocity * rem;
                }
                break;
            };
            let left = seg.duration - self.seg_elapsed;
            if rem < left {
                self.seg_elapsed += rem;
                self.current.velocity = seg.velocity_at(self.seg_elapsed);
                self.current.position = seg.position_at(self.seg_elapsed);
                break;
            }
            rem -= left;
            self.current.velocity = seg.velocity_at(seg.duration);
            self.current.position = seg.position_at(seg.duration);
            self.segments.pop_front();
            self.seg_elapsed = 0.0;
            if self.segments.is_empty() {
                // Land on the endpoint exactly; kills integration rounding.
                if self.endpoint.velocity == 0.0 {
                    self.current.position = self.endpoint.position;
                    self.current.velocity = 0.0;
                } else {
                    self.current.velocity = self.endpoint.velocity;
                }
            }
        }
        self.current
    }

    /// Re-derive the segment queue from the current sample.
    fn rebuild(&mut self) {
        self.segments.clear();
        self.seg_elapsed = 0.0;

        let a = self.limits.acceleration;
        let vmax = self.limits.velocity;
        let p0 = self.current.position;
        let v0 = self.current.velocity;
        let target_v = self.endpoint.velocity.clamp(-vmax, vmax);
        self.endpoint.velocity = target_v;

        if target_v != 0.0 {
            // Velocity target: one bounded ramp, then the advance loop
            // coasts indefinitely at the target velocity.
            let dv = target_v - v0;
            let ramp = dv.abs() / a;
            if ramp > 0.0 {
                self.segments.push_back(Segment {
                    duration: ramp,
                    start_pos: p0,
                    start_vel: v0,
                    accel: dv.signum() * a,
                });
            }
            self.endpoint.time = self.current.time + ramp;
            return;
        }

        // Position target, arriving at rest.
        let mut p = p0;
        let mut v = v0;
        let goal = self.endpoint.position;

        if v != 0.0 {
            // Brake to rest first when moving away from the goal, or when
            // stopping from the current velocity would overshoot it.
            let stop_dist = v * v / (2.0 * a);
            let p_stop = p + v.signum() * stop_dist;
            if (goal - p) * v < 0.0 || (goal - p_stop) * v < 0.0 {
                let ramp = v.abs() / a;
                self.segments.push_back(Segment {
                    duration: ramp,
                    start_pos: p,
                    start_vel: v,
                    accel: -v.signum() * a,
                });
                p = p_stop;
                v = 0.0;
            }
        }

        let dist = goal - p;
        if dist != 0.0 || v != 0.0 {
            let s = if dist != 0.0 { dist.signum() } else { v.signum() };
            let d = dist.abs();
            let speed = v.abs();
            // Peak of the triangular profile, capped by the velocity limit.
            let peak = (a * d + 0.5 * speed * speed).sqrt().min(vmax);

            // Entry phase: accelerate up to the peak, or bleed speed off if
            // the cap dropped below the current velocity mid-flight.
            let t1 = (peak - speed).abs() / a;
            let d1 = 0.5 * (peak + speed) * t1;
            // Final deceleration to rest.
            let t3 = peak / a;
            let d3 = 0.5 * peak * t3;
            let d2 = (d - d1 - d3).max(0.0);
            let t2 = if peak > 0.0 { d2 / peak } else { 0.0 };

            if t1 > 0.0 {
                let accel = if peak >= speed { s * a } else { -s * a };
                self.segments.push_back(Segment {
                    duration: t1,
                    start_pos: p,
                    start_vel: s * speed,
                    accel,
                });
                p += s * d1;
            }
            if t2 > 0.0 {
                self.segments.push_back(Segment {
                    duration: t2,
                    start_pos: p,
                    start_vel: s * peak,
                    accel: 0.0,
                });
                p += s * d2;
            }
            if t3 > 0.0 {
                self.segments.push_back(Segment {
                    duration: t3,
                    start_pos: p,
                    start_vel: s * peak,
                    accel: -s * a,
                });
            }
        }

        let total: f64 = self.segments.iter().map(|seg| seg.duration).sum();
        self.endpoint.time = self.current.time + total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(start: f64, accel: f64, vel: f64) -> Route {
        Route::new(
            start,
            MotionLimits {
                acceleration: accel,
                velocity: vel,
            },
        )
    }

    #[test]
    fn rest_to_rest_trapezoid() {
        let mut r = route(0.0, 5.0, 10.0);
        r.set_endpoint(100.0, 0.0);

        let p = r.advance(1.0, Replan::Restart);
        assert_eq!(p.velocity, 5.0);
        assert_eq!(p.position, 2.5);

        // Accel takes 2s over 10 units, cruise 8s over 80, decel 2s.
        let p = r.advance(11.0, Replan::Continue);
        assert_eq!(p.position, 100.0);
        assert_eq!(p.velocity, 0.0);
        assert_eq!(r.endpoint().time, 12.0);
    }

    #[test]
    fn triangular_when_distance_is_short() {
        let mut r = route(0.0, 2.0, 10.0);
        r.set_endpoint(4.0, 0.0);
        let p = r.advance(100.0, Replan::Restart);
        assert_eq!(p.position, 4.0);
        assert_eq!(p.velocity, 0.0);
        // Peak sqrt(a*d) = sqrt(8) stays below the cap.
        assert!(r.endpoint().time < 3.0);
    }

    #[test]
    fn zero_elapsed_touches_only_time() {
        let mut r = route(7.0, 1.0, 1.0);
        r.set_endpoint(20.0, 0.0);
        r.advance(1.0, Replan::Restart);
        let before = r.current();
        let after = r.advance(0.0, Replan::Continue);
        assert_eq!(after.position, before.position);
        assert_eq!(after.velocity, before.velocity);
        assert_eq!(after.time, before.time);
    }

    #[test]
    fn endpoint_at_current_is_done_immediately() {
        let mut r = route(5.0, 2.0, 4.0);
        r.set_endpoint(5.0, 0.0);
        let p = r.advance(0.5, Replan::Restart);
        assert_eq!(p.position, 5.0);
        assert_eq!(p.velocity, 0.0);
    }

    #[test]
    fn replan_keeps_velocity_continuous() {
        let mut r = route(0.0, 5.0, 10.0);
        r.set_endpoint(100.0, 0.0);
        r.advance(2.0, Replan::Restart);
        assert_eq!(r.current().velocity, 10.0);

        // Reverse mid-flight: the new profile must decelerate through
        // zero, not jump.
        r.set_endpoint(-100.0, 0.0);
        let p = r.advance(0.1, Replan::Restart);
        assert!((p.velocity - 9.5).abs() < 1e-9);
        let p = r.advance(1.9, Replan::Continue);
        assert!(p.velocity.abs() < 1e-9);
    }

    #[test]
    fn overshoot_brakes_then_returns() {
        let mut r = route(0.0, 5.0, 10.0);
        r.set_endpoint(100.0, 0.0);
        r.advance(2.0, Replan::Restart);

        // From (10.0, v=10) a stop needs 10 units; target 12 overshoots.
        r.set_endpoint(12.0, 0.0);
        let mut peak = f64::MIN;
        loop {
            let p = r.advance(0.25, Replan::Continue);
            peak = peak.max(p.position);
            if p.velocity == 0.0 && p.position == 12.0 {
                break;
            }
            assert!(p.time < 60.0, "failed to settle");
        }
        assert!(peak > 12.0, "expected overshoot past target, got {peak}");
        assert!(peak <= 20.0 + 1e-9);
    }

    #[test]
    fn jog_ramps_then_coasts() {
        let mut r = route(0.0, 2.0, 10.0);
        // Ramp to 5 units/s takes 2.5s and 6.25 units.
        r.set_endpoint(6.25, 5.0);
        let p = r.advance(1.0, Replan::Restart);
        assert_eq!(p.velocity, 2.0);
        let p = r.advance(1.5, Replan::Continue);
        assert_eq!(p.velocity, 5.0);
        assert_eq!(p.position, 6.25);
        let p = r.advance(2.0, Replan::Continue);
        assert_eq!(p.velocity, 5.0);
        assert_eq!(p.position, 16.25);
    }

    #[test]
    fn jog_velocity_is_clamped_to_cap() {
        let mut r = route(0.0, 2.0, 3.0);
        r.set_endpoint(0.0, 50.0);
        let p = r.advance(10.0, Replan::Restart);
        assert_eq!(p.velocity, 3.0);
        assert_eq!(r.endpoint().velocity, 3.0);
    }

    #[test]
    fn lowered_velocity_cap_bleeds_off_mid_flight() {
        let mut r = route(0.0, 5.0, 10.0);
        r.set_endpoint(200.0, 0.0);
        r.advance(2.0, Replan::Restart);
        assert_eq!(r.current().velocity, 10.0);

        r.set_limits(MotionLimits {
            acceleration: 5.0,
            velocity: 4.0,
        });
        let p = r.advance(0.4, Replan::Restart);
        assert!((p.velocity - 8.0).abs() < 1e-9);
        let p = r.advance(0.8, Replan::Continue);
        assert!((p.velocity - 4.0).abs() < 1e-9);
        // Cruises at the new cap from here on.
        let p = r.advance(1.0, Replan::Continue);
        assert!((p.velocity - 4.0).abs() < 1e-9);
    }

    #[test]
    fn acceleration_cap_bounds_per_step_velocity_change() {
        let mut r = route(0.0, 3.0, 7.0);
        r.set_endpoint(50.0, 0.0);
        let mut replan = Replan::Restart;
        let mut last_v = 0.0;
        let dt = 0.05;
        for _ in 0..1000 {
            let p = r.advance(dt, replan);
            replan = Replan::Continue;
            assert!(p.velocity.abs() <= 7.0 + 1e-9);
            assert!((p.velocity - last_v).abs() <= 3.0 * dt + 1e-9);
            last_v = p.velocity;
        }
        assert_eq!(r.current().position, 50.0);
    }
}
