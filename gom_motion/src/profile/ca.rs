//! Constant-acceleration (trapezoidal) profile.
//!
//! Phase I accelerates at `+a` to the peak speed, phase II cruises, phase
//! III decelerates at `-a`. When the distance is too short for a full
//! cruise the profile degenerates to a triangle.

use gom_math::{GoError, GoResult};

use super::ProfileInterp;

const TIME_FUZZ: f64 = 1.0e-12;
const DIST_FUZZ: f64 = 1.0e-12;

/// Precomputed 3-segment profile. All times and distances are cumulative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaProfile {
    /// Acceleration magnitude in phases I and III.
    pub at0: f64,
    /// End of phase I.
    pub t1: f64,
    /// Distance at `t1`.
    pub dt1: f64,
    /// Speed at `t1`, held through phase II.
    pub vt1: f64,
    /// End of phase II.
    pub t2: f64,
    /// Distance at `t2`.
    pub dt2: f64,
    /// Total time.
    pub tend: f64,
    /// Total distance.
    pub dtend: f64,
    /// 1 / dtend, or 0 for a zero-length profile.
    pub invd: f64,
}

impl CaProfile {
    /// Plan a move of distance `d` with speed limit `v` and acceleration
    /// `a`. Chooses trapezoid or triangle as the distance allows.
    pub fn compute(d: f64, v: f64, a: f64) -> GoResult<CaProfile> {
        if d < 0.0 || v <= 0.0 || a <= 0.0 {
            return Err(GoError::BadArgs);
        }
        if d < DIST_FUZZ {
            return Ok(CaProfile::default());
        }

        let d_acc = v * v / (2.0 * a);
        let prof = if 2.0 * d_acc >= d {
            // Triangular: never reaches the speed limit.
            let t1 = (d / a).sqrt();
            let vt1 = a * t1;
            CaProfile {
                at0: a,
                t1,
                dt1: 0.5 * d,
                vt1,
                t2: t1,
                dt2: 0.5 * d,
                tend: 2.0 * t1,
                dtend: d,
                invd: 1.0 / d,
            }
        } else {
            let t1 = v / a;
            let cruise = d - 2.0 * d_acc;
            let t2 = t1 + cruise / v;
            CaProfile {
                at0: a,
                t1,
                dt1: d_acc,
                vt1: v,
                t2,
                dt2: d_acc + cruise,
                tend: t2 + t1,
                dtend: d,
                invd: 1.0 / d,
            }
        };
        Ok(prof)
    }

    /// Synthesize a profile from raw phase durations: accelerate at `acc`
    /// for `deltacc`, cruise for `deltvel`, decelerate for `deltacc`.
    /// Useful for building test cases directly.
    pub fn generate(acc: f64, deltacc: f64, deltvel: f64) -> GoResult<CaProfile> {
        if acc < 0.0 || deltacc < 0.0 || deltvel < 0.0 {
            return Err(GoError::BadArgs);
        }
        let t1 = deltacc;
        let vt1 = acc * deltacc;
        let dt1 = 0.5 * acc * deltacc * deltacc;
        let t2 = t1 + deltvel;
        let dt2 = dt1 + vt1 * deltvel;
        let tend = t2 + deltacc;
        let dtend = dt2 + dt1;
        Ok(CaProfile {
            at0: acc,
            t1,
            dt1,
            vt1,
            t2,
            dt2,
            tend,
            dtend,
            invd: if dtend > DIST_FUZZ { 1.0 / dtend } else { 0.0 },
        })
    }

    /// Stretch the profile so the same distance takes total time `t`.
    /// `t` may not be shorter than the planned time.
    pub fn scale(&self, t: f64) -> GoResult<CaProfile> {
        if self.tend < TIME_FUZZ {
            // Nothing to stretch; a zero-length profile stays zero.
            return if t >= 0.0 { Ok(*self) } else { Err(GoError::BadArgs) };
        }
        if t < self.tend {
            return Err(GoError::BadArgs);
        }
        let k = t / self.tend;
        Ok(CaProfile {
            at0: self.at0 / (k * k),
            t1: self.t1 * k,
            dt1: self.dt1,
            vt1: self.vt1 / k,
            t2: self.t2 * k,
            dt2: self.dt2,
            tend: self.tend * k,
            dtend: self.dtend,
            invd: self.invd,
        })
    }

    /// Replan so braking begins at `t`; the move stops as fast as the
    /// profile's own acceleration allows and the total distance shrinks.
    pub fn stop(&self, t: f64) -> GoResult<CaProfile> {
        let t = t.clamp(0.0, self.tend);
        if t >= self.t2 {
            // Already decelerating (or done); nothing to replan.
            return Ok(*self);
        }
        let mut out = *self;
        if t <= self.t1 {
            // Cut the acceleration phase short.
            let vt1 = self.at0 * t;
            out.t1 = t;
            out.vt1 = vt1;
            out.dt1 = 0.5 * self.at0 * t * t;
            out.t2 = t;
            out.dt2 = out.dt1;
        } else {
            // Cut the cruise short.
            out.t2 = t;
            out.dt2 = self.dt1 + self.vt1 * (t - self.t1);
        }
        let brake = if self.at0 > 0.0 { out.vt1 / self.at0 } else { 0.0 };
        out.tend = out.t2 + brake;
        out.dtend = out.dt2 + 0.5 * out.vt1 * brake;
        out.invd = if out.dtend > DIST_FUZZ { 1.0 / out.dtend } else { 0.0 };
        Ok(out)
    }

    /// Re-time the cruise so the motion finishes at `t`. `t` must be at
    /// least the no-cruise (fastest stop) time; the distance follows the
    /// cruise change.
    pub fn extend(&self, t: f64) -> GoResult<CaProfile> {
        let cruise_old = self.t2 - self.t1;
        let cruise_new = t - (self.tend - cruise_old);
        if cruise_new < 0.0 {
            return Err(GoError::BadArgs);
        }
        let delta = cruise_new - cruise_old;
        let mut out = *self;
        out.t2 = self.t2 + delta;
        out.dt2 = self.dt2 + self.vt1 * delta;
        out.tend = t;
        out.dtend = self.dtend + self.vt1 * delta;
        out.invd = if out.dtend > DIST_FUZZ { 1.0 / out.dtend } else { 0.0 };
        Ok(out)
    }

    /// Sample the profile at time `t`, clipped to `[0, tend]`.
    pub fn interp(&self, t: f64) -> ProfileInterp {
        if t >= self.tend || self.tend < TIME_FUZZ {
            return ProfileInterp { s: self.dtend * self.invd, d: self.dtend, v: 0.0, a: 0.0, j: 0.0 };
        }
        let t = t.max(0.0);
        let (d, v, a) = if t <= self.t1 {
            (0.5 * self.at0 * t * t, self.at0 * t, self.at0)
        } else if t <= self.t2 {
            let tau = t - self.t1;
            (self.dt1 + self.vt1 * tau, self.vt1, 0.0)
        } else {
            let tau = t - self.t2;
            (
                self.dt2 + self.vt1 * tau - 0.5 * self.at0 * tau * tau,
                self.vt1 - self.at0 * tau,
                -self.at0,
            )
        };
        ProfileInterp { s: d * self.invd, d, v, a, j: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_breakpoints() {
        // d = 10, v = 1, a = 1: accel 1s over 0.5, cruise 9s, decel 1s.
        let p = CaProfile::compute(10.0, 1.0, 1.0).unwrap();
        assert!((p.t1 - 1.0).abs() < 1e-12);
        assert!((p.dt1 - 0.5).abs() < 1e-12);
        assert!((p.t2 - 10.0).abs() < 1e-12);
        assert!((p.tend - 11.0).abs() < 1e-12);
        assert!((p.dtend - 10.0).abs() < 1e-12);
    }

    #[test]
    fn triangle_when_short() {
        // d = 0.5, v = 1, a = 1 never reaches the speed limit.
        let p = CaProfile::compute(0.5, 1.0, 1.0).unwrap();
        assert!((p.t1 - p.t2).abs() < 1e-12);
        assert!(p.vt1 < 1.0);
        assert!((p.interp(p.tend).d - 0.5).abs() < 1e-12);
    }

    #[test]
    fn interp_terminal_values() {
        let p = CaProfile::compute(2.0, 1.0, 1.0).unwrap();
        let i0 = p.interp(0.0);
        assert_eq!(i0.d, 0.0);
        assert_eq!(i0.v, 0.0);
        let iend = p.interp(p.tend + 5.0);
        assert!((iend.d - 2.0).abs() < 1e-12);
        assert_eq!(iend.v, 0.0);
        let ineg = p.interp(-1.0);
        assert_eq!(ineg.d, 0.0);
    }

    #[test]
    fn interp_monotonic_and_bounded() {
        let p = CaProfile::compute(3.7, 0.9, 1.3).unwrap();
        let mut last = -1.0;
        let mut t = 0.0;
        while t <= p.tend {
            let i = p.interp(t);
            assert!(i.d >= last);
            assert!(i.v.abs() <= 0.9 + 1e-9);
            assert!(i.a.abs() <= 1.3 + 1e-9);
            assert!(i.s >= 0.0 && i.s <= 1.0 + 1e-9);
            last = i.d;
            t += 0.001;
        }
    }

    #[test]
    fn scale_preserves_distance() {
        let p = CaProfile::compute(4.0, 2.0, 1.0).unwrap();
        let slow = p.scale(2.0 * p.tend).unwrap();
        assert!((slow.tend - 2.0 * p.tend).abs() < 1e-9);
        assert!((slow.dtend - p.dtend).abs() < 1e-12);
        assert!((slow.vt1 - p.vt1 / 2.0).abs() < 1e-9);
        assert!((slow.at0 - p.at0 / 4.0).abs() < 1e-9);
        assert!((slow.interp(slow.tend).d - p.dtend).abs() < 1e-9);
        assert!(p.scale(0.5 * p.tend).is_err());
    }

    #[test]
    fn stop_halts_early() {
        let p = CaProfile::compute(10.0, 1.0, 1.0).unwrap();
        // Stop mid-cruise at t = 5: one more second to brake from v = 1.
        let s = p.stop(5.0).unwrap();
        assert!((s.tend - 6.0).abs() < 1e-9);
        assert!(s.dtend < p.dtend);
        assert!(s.dtend > 0.0);
        // Prefix must agree with the original plan.
        for t in [0.0, 0.5, 2.0, 4.9] {
            assert!((s.interp(t).d - p.interp(t).d).abs() < 1e-9);
        }
        let end = s.interp(s.tend);
        assert_eq!(end.v, 0.0);
    }

    #[test]
    fn stop_during_accel() {
        let p = CaProfile::compute(10.0, 2.0, 1.0).unwrap();
        let s = p.stop(1.0).unwrap();
        // v(1) = 1, braking takes 1 s; total distance 0.5 + 0.5.
        assert!((s.tend - 2.0).abs() < 1e-9);
        assert!((s.dtend - 1.0).abs() < 1e-9);
    }

    #[test]
    fn extend_retimes_cruise() {
        let p = CaProfile::compute(10.0, 1.0, 1.0).unwrap();
        // Fastest no-cruise time is 2 s; stretch a stopped profile out.
        let e = p.extend(8.0).unwrap();
        assert!((e.tend - 8.0).abs() < 1e-9);
        assert!(e.dtend < p.dtend);
        let i = e.interp(e.tend);
        assert!((i.d - e.dtend).abs() < 1e-9);
        assert!(p.extend(1.0).is_err());
    }

    #[test]
    fn generate_matches_compute() {
        let c = CaProfile::compute(10.0, 1.0, 1.0).unwrap();
        let g = CaProfile::generate(1.0, 1.0, 9.0).unwrap();
        assert!((c.tend - g.tend).abs() < 1e-12);
        assert!((c.dtend - g.dtend).abs() < 1e-12);
        assert!((c.vt1 - g.vt1).abs() < 1e-12);
    }

    #[test]
    fn bad_args_rejected() {
        assert!(CaProfile::compute(-1.0, 1.0, 1.0).is_err());
        assert!(CaProfile::compute(1.0, 0.0, 1.0).is_err());
        assert!(CaProfile::compute(1.0, 1.0, -1.0).is_err());
    }
}
