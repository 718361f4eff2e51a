//! Constant-jerk (s-curve) profile.
//!
//! Seven phases with jerk {+j, 0, -j, 0, -j, 0, +j}: acceleration ramps
//! 0 -> a -> 0 while speed rises to the cruise value, then the mirror
//! image brings everything back to zero. The planner drops phases the
//! distance cannot afford: constant-acceleration hold first, then the
//! cruise, leaving a pure s-curve for the shortest moves.
//!
//! Breakpoints are cumulative: `t1..t6` end phases I..VI, `tend` ends
//! phase VII. The deceleration side is described only by its breakpoints,
//! so a stop replan may give it different phase lengths than the
//! acceleration side.

use gom_math::{GoError, GoResult};

use super::ProfileInterp;

const TIME_FUZZ: f64 = 1.0e-12;
const DIST_FUZZ: f64 = 1.0e-12;

/// Precomputed 7-segment profile.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CjProfile {
    /// Jerk magnitude in phases I, III, V and VII.
    pub jt0: f64,
    /// Acceleration at the end of phase I (the peak).
    pub at1: f64,
    pub t1: f64,
    pub dt1: f64,
    pub vt1: f64,
    pub t2: f64,
    pub dt2: f64,
    pub vt2: f64,
    pub t3: f64,
    pub dt3: f64,
    /// Cruise speed (phase IV).
    pub vt3: f64,
    pub t4: f64,
    pub dt4: f64,
    pub t5: f64,
    pub dt5: f64,
    pub t6: f64,
    pub dt6: f64,
    pub tend: f64,
    pub dtend: f64,
    /// 1 / dtend, or 0 for a zero-length profile.
    pub invd: f64,
}

impl CjProfile {
    /// Plan a move of distance `d` under limits `v`, `a` and jerk `j`.
    pub fn compute(d: f64, v: f64, a: f64, j: f64) -> GoResult<CjProfile> {
        if d < 0.0 || v <= 0.0 || a <= 0.0 || j <= 0.0 {
            return Err(GoError::BadArgs);
        }
        if d < DIST_FUZZ {
            return Ok(CjProfile::default());
        }

        // Jerk and hold times that just reach the speed limit.
        let accel_limited = v * j >= a * a;
        let mut tj = if accel_limited { a / j } else { (v / j).sqrt() };
        let mut ta = if accel_limited { v / a - a / j } else { 0.0 };

        // Distance consumed by a full accelerate-and-decelerate pair at
        // cruise speed vpeak = j*tj*(tj + ta).
        let vpeak = j * tj * (tj + ta);
        let d_min = vpeak * (2.0 * tj + ta);

        let tv = if d >= d_min {
            (d - d_min) / vpeak
        } else {
            // Too short to cruise; shed the speed limit.
            if accel_limited && d >= 2.0 * a * tj * tj {
                // Keep the acceleration hold, shorten it:
                // a (tj + ta)(2 tj + ta) = d.
                ta = 0.5 * (-3.0 * tj + (tj * tj + 4.0 * d / a).sqrt());
                0.0
            } else {
                // Pure s-curve.
                tj = (d / (2.0 * j)).cbrt();
                ta = 0.0;
                0.0
            }
        };

        Self::generate(j, tj, ta, tv)
    }

    /// Synthesize a profile from raw phase durations: jerk time `tj`,
    /// acceleration hold `ta`, cruise `tv`.
    pub fn generate(j: f64, tj: f64, ta: f64, tv: f64) -> GoResult<CjProfile> {
        if j < 0.0 || tj < 0.0 || ta < 0.0 || tv < 0.0 {
            return Err(GoError::BadArgs);
        }
        let at1 = j * tj;

        let t1 = tj;
        let vt1 = 0.5 * j * tj * tj;
        let dt1 = j * tj * tj * tj / 6.0;

        let t2 = t1 + ta;
        let vt2 = vt1 + at1 * ta;
        let dt2 = dt1 + vt1 * ta + 0.5 * at1 * ta * ta;

        let t3 = t2 + tj;
        let vt3 = vt2 + 0.5 * j * tj * tj;
        let dt3 = dt2 + vt2 * tj + 0.5 * at1 * tj * tj - j * tj * tj * tj / 6.0;

        let t4 = t3 + tv;
        let dt4 = dt3 + vt3 * tv;

        let t5 = t4 + tj;
        let dt5 = dt4 + vt3 * tj - j * tj * tj * tj / 6.0;
        let v5 = vt3 - 0.5 * j * tj * tj;

        let t6 = t5 + ta;
        let dt6 = dt5 + v5 * ta - 0.5 * at1 * ta * ta;
        let v6 = v5 - at1 * ta;

        let tend = t6 + tj;
        let dtend = dt6 + v6 * tj - 0.5 * at1 * tj * tj + j * tj * tj * tj / 6.0;

        Ok(CjProfile {
            jt0: j,
            at1,
            t1,
            dt1,
            vt1,
            t2,
            dt2,
            vt2,
            t3,
            dt3,
            vt3,
            t4,
            dt4,
            t5,
            dt5,
            t6,
            dt6,
            tend,
            dtend,
            invd: if dtend > DIST_FUZZ { 1.0 / dtend } else { 0.0 },
        })
    }

    /// Stretch the profile so the same distance takes total time `t`.
    pub fn scale(&self, t: f64) -> GoResult<CjProfile> {
        if self.tend < TIME_FUZZ {
            return if t >= 0.0 { Ok(*self) } else { Err(GoError::BadArgs) };
        }
        if t < self.tend {
            return Err(GoError::BadArgs);
        }
        let k = t / self.tend;
        let k2 = k * k;
        let k3 = k2 * k;
        Ok(CjProfile {
            jt0: self.jt0 / k3,
            at1: self.at1 / k2,
            t1: self.t1 * k,
            dt1: self.dt1,
            vt1: self.vt1 / k,
            t2: self.t2 * k,
            dt2: self.dt2,
            vt2: self.vt2 / k,
            t3: self.t3 * k,
            dt3: self.dt3,
            vt3: self.vt3 / k,
            t4: self.t4 * k,
            dt4: self.dt4,
            t5: self.t5 * k,
            dt5: self.dt5,
            t6: self.t6 * k,
            dt6: self.dt6,
            tend: self.tend * k,
            dtend: self.dtend,
            invd: self.invd,
        })
    }

    /// Replan so braking begins at `t`. The acceleration ramp is brought
    /// to zero at the profile's own jerk, the cruise is dropped, and the
    /// deceleration side is rebuilt for the speed actually reached. The
    /// total distance shrinks accordingly.
    pub fn stop(&self, t: f64) -> GoResult<CjProfile> {
        let t = t.clamp(0.0, self.tend);
        if t >= self.t4 || self.tend < TIME_FUZZ {
            // Already decelerating or done.
            return Ok(*self);
        }
        let j = self.jt0;
        let mut out = *self;

        // Truncate the acceleration side at t, finishing any accel ramp.
        if t <= self.t1 {
            let a0 = j * t;
            let v0 = 0.5 * j * t * t;
            let d0 = j * t * t * t / 6.0;
            out.at1 = a0;
            out.t1 = t;
            out.vt1 = v0;
            out.dt1 = d0;
            out.t2 = t;
            out.vt2 = v0;
            out.dt2 = d0;
            let tr = if j > 0.0 { a0 / j } else { 0.0 };
            out.t3 = t + tr;
            out.vt3 = v0 + 0.5 * a0 * tr;
            out.dt3 = d0 + v0 * tr + 0.5 * a0 * tr * tr - j * tr * tr * tr / 6.0;
        } else if t <= self.t2 {
            let tau = t - self.t1;
            let v0 = self.vt1 + self.at1 * tau;
            let d0 = self.dt1 + self.vt1 * tau + 0.5 * self.at1 * tau * tau;
            out.t2 = t;
            out.vt2 = v0;
            out.dt2 = d0;
            let tr = if j > 0.0 { self.at1 / j } else { 0.0 };
            out.t3 = t + tr;
            out.vt3 = v0 + 0.5 * self.at1 * tr;
            out.dt3 = d0 + v0 * tr + 0.5 * self.at1 * tr * tr - j * tr * tr * tr / 6.0;
        } else if t <= self.t3 {
            // Phase III already ramps the acceleration to zero; let it
            // finish as planned.
        } else {
            // Cruise: cut it at t.
            let tau = t - self.t3;
            out.t4 = t;
            out.dt4 = self.dt3 + self.vt3 * tau;
        }
        if t <= self.t3 {
            out.t4 = out.t3;
            out.dt4 = out.dt3;
        }

        // Rebuild the deceleration side for the speed we actually carry.
        let v = out.vt3;
        let a_bound = if out.at1 > 0.0 { out.at1 } else { f64::INFINITY };
        let (tj2, ta2) = if j <= 0.0 || v < DIST_FUZZ {
            (0.0, 0.0)
        } else if v * j >= a_bound * a_bound {
            (a_bound / j, v / a_bound - a_bound / j)
        } else {
            ((v / j).sqrt(), 0.0)
        };

        out.t5 = out.t4 + tj2;
        out.dt5 = out.dt4 + v * tj2 - j * tj2 * tj2 * tj2 / 6.0;
        let a5 = -j * tj2;
        let v5 = v - 0.5 * j * tj2 * tj2;
        out.t6 = out.t5 + ta2;
        out.dt6 = out.dt5 + v5 * ta2 + 0.5 * a5 * ta2 * ta2;
        let v6 = v5 + a5 * ta2;
        out.tend = out.t6 + tj2;
        out.dtend = out.dt6 + v6 * tj2 + 0.5 * a5 * tj2 * tj2 + j * tj2 * tj2 * tj2 / 6.0;
        out.invd = if out.dtend > DIST_FUZZ { 1.0 / out.dtend } else { 0.0 };
        Ok(out)
    }

    /// Re-time the cruise so the motion finishes at `t`. `t` must be at
    /// least the no-cruise time; the distance follows the cruise change.
    pub fn extend(&self, t: f64) -> GoResult<CjProfile> {
        let cruise_old = self.t4 - self.t3;
        let cruise_new = t - (self.tend - cruise_old);
        if cruise_new < 0.0 {
            return Err(GoError::BadArgs);
        }
        let delta = cruise_new - cruise_old;
        let dd = self.vt3 * delta;
        let mut out = *self;
        out.t4 = self.t4 + delta;
        out.dt4 = self.dt4 + dd;
        out.t5 = self.t5 + delta;
        out.dt5 = self.dt5 + dd;
        out.t6 = self.t6 + delta;
        out.dt6 = self.dt6 + dd;
        out.tend = t;
        out.dtend = self.dtend + dd;
        out.invd = if out.dtend > DIST_FUZZ { 1.0 / out.dtend } else { 0.0 };
        Ok(out)
    }

    /// Sample the profile at time `t`, clipped to `[0, tend]`.
    pub fn interp(&self, t: f64) -> ProfileInterp {
        let j = self.jt0;
        if t >= self.tend || self.tend < TIME_FUZZ {
            return ProfileInterp {
                s: self.dtend * self.invd,
                d: self.dtend,
                v: 0.0,
                a: 0.0,
                j: 0.0,
            };
        }
        let t = t.max(0.0);

        let (d, v, a, jout) = if t <= self.t1 {
            (j * t * t * t / 6.0, 0.5 * j * t * t, j * t, j)
        } else if t <= self.t2 {
            let tau = t - self.t1;
            (
                self.dt1 + self.vt1 * tau + 0.5 * self.at1 * tau * tau,
                self.vt1 + self.at1 * tau,
                self.at1,
                0.0,
            )
        } else if t <= self.t3 {
            let tau = t - self.t2;
            (
                self.dt2 + self.vt2 * tau + 0.5 * self.at1 * tau * tau - j * tau * tau * tau / 6.0,
                self.vt2 + self.at1 * tau - 0.5 * j * tau * tau,
                self.at1 - j * tau,
                -j,
            )
        } else if t <= self.t4 {
            let tau = t - self.t3;
            (self.dt3 + self.vt3 * tau, self.vt3, 0.0, 0.0)
        } else {
            // The deceleration side's phase lengths come from the stored
            // breakpoints so stop-replanned profiles stay consistent.
            let tj2 = self.t5 - self.t4;
            let a5 = -j * tj2;
            let v5 = self.vt3 - 0.5 * j * tj2 * tj2;
            if t <= self.t5 {
                let tau = t - self.t4;
                (
                    self.dt4 + self.vt3 * tau - j * tau * tau * tau / 6.0,
                    self.vt3 - 0.5 * j * tau * tau,
                    -j * tau,
                    -j,
                )
            } else if t <= self.t6 {
                let tau = t - self.t5;
                (
                    self.dt5 + v5 * tau + 0.5 * a5 * tau * tau,
                    v5 + a5 * tau,
                    a5,
                    0.0,
                )
            } else {
                let ta2 = self.t6 - self.t5;
                let v6 = v5 + a5 * ta2;
                let tau = t - self.t6;
                (
                    self.dt6 + v6 * tau + 0.5 * a5 * tau * tau + j * tau * tau * tau / 6.0,
                    v6 + a5 * tau + 0.5 * j * tau * tau,
                    a5 + j * tau,
                    j,
                )
            }
        };

        ProfileInterp { s: d * self.invd, d, v, a, j: jout }
    }
}
