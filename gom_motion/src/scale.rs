//! Walked-in time scaling.
//!
//! The queue multiplies its per-cycle time step by a scale factor. Scale
//! changes are never applied abruptly: a requested target is ramped in
//! through a 3-segment constant-acceleration profile on the scale value
//! itself, bounded by the requested scale velocity and acceleration.

use gom_math::{GoError, GoResult};

use crate::profile::CaProfile;

/// Scale descriptor with its ramp engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeScale {
    /// Current scale factor.
    scale: f64,
    /// Scale at the start of the active ramp.
    base: f64,
    /// Ramp profile over |target - base|.
    ramp: CaProfile,
    /// Ramping upward (adding the profile distance to the base).
    dir_up: bool,
    /// Ramp in progress.
    scaling: bool,
    /// Time into the active ramp.
    t: f64,
    /// Pending request, applied at the next evaluation.
    next: Option<(f64, f64, f64)>,
}

impl TimeScale {
    /// Start at a fixed scale, typically 1.
    pub fn new(scale: f64) -> GoResult<TimeScale> {
        if scale < 0.0 {
            return Err(GoError::BadArgs);
        }
        Ok(TimeScale { scale, base: scale, ..Default::default() })
    }

    /// Request a walk to `scale`, moving at most `v` per second and
    /// accelerating at most `a` per second squared.
    pub fn set(&mut self, scale: f64, v: f64, a: f64) -> GoResult<()> {
        if scale < 0.0 || v <= 0.0 || a <= 0.0 {
            return Err(GoError::BadArgs);
        }
        self.next = Some((scale, v, a));
        Ok(())
    }

    /// Current scale without advancing time.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// True while a ramp is active or pending.
    #[inline]
    pub fn is_scaling(&self) -> bool {
        self.scaling || self.next.is_some()
    }

    /// Advance by `deltat` and return the scale to use this cycle.
    ///
    /// A pending request supersedes an active ramp, restarting from the
    /// current scale value.
    pub fn eval(&mut self, deltat: f64) -> f64 {
        if let Some((target, v, a)) = self.next.take() {
            let delta = (target - self.scale).abs();
            if delta < 1.0e-12 {
                self.scale = target;
                self.scaling = false;
            } else if let Ok(ramp) = CaProfile::compute(delta, v, a) {
                self.ramp = ramp;
                self.base = self.scale;
                self.dir_up = target > self.scale;
                self.t = 0.0;
                self.scaling = true;
            }
        }

        if self.scaling {
            self.t += deltat;
            let i = self.ramp.interp(self.t);
            self.scale = if self.dir_up { self.base + i.d } else { self.base - i.d };
            if self.t >= self.ramp.tend {
                self.scaling = false;
            }
        }

        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_until_requested() {
        let mut ts = TimeScale::new(1.0).unwrap();
        for _ in 0..10 {
            assert_eq!(ts.eval(0.01), 1.0);
        }
    }

    #[test]
    fn ramps_down_smoothly() {
        let mut ts = TimeScale::new(1.0).unwrap();
        ts.set(0.5, 0.5, 0.5).unwrap();
        let dt = 0.001;
        let mut last = 1.0;
        let mut steps = 0;
        while ts.is_scaling() && steps < 100_000 {
            let s = ts.eval(dt);
            assert!(s <= last + 1e-12, "scale rose while ramping down");
            // Rate bounded by the requested scale velocity.
            assert!((last - s) / dt <= 0.5 + 1e-6);
            last = s;
            steps += 1;
        }
        assert!((ts.scale() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn new_request_supersedes_ramp() {
        let mut ts = TimeScale::new(1.0).unwrap();
        ts.set(0.2, 1.0, 1.0).unwrap();
        for _ in 0..100 {
            ts.eval(0.001);
        }
        let mid = ts.scale();
        assert!(mid < 1.0 && mid > 0.2);
        ts.set(1.0, 10.0, 10.0).unwrap();
        let mut steps = 0;
        while ts.is_scaling() && steps < 100_000 {
            ts.eval(0.001);
            steps += 1;
        }
        assert!((ts.scale() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_requests() {
        let mut ts = TimeScale::new(1.0).unwrap();
        assert!(ts.set(-0.1, 1.0, 1.0).is_err());
        assert!(ts.set(0.5, 0.0, 1.0).is_err());
        assert!(TimeScale::new(-1.0).is_err());
    }
}
