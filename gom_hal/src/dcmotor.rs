//! Closed-form simulation of a separately excited DC motor.
//!
//! The rotor dynamics under constant input over one cycle have an exact
//! solution, so the simulation is a per-cycle arithmetic update rather
//! than an integration:
//!
//! - Current input: `Jm y'' + Bm y' = i K - Tl - Tf`, a first-order
//!   system in velocity with one exponential.
//! - Voltage input: `La Jm y''' + (Bm La + Ra Jm) y'' + (Ra Bm + K^2) y'
//!   = K v - Ra Tl - Ra Tf`, whose characteristic discriminant
//!   `b^2 - 4ac` picks one of three closed forms: distinct real roots,
//!   an identically zero root (pure first-order response), or a complex
//!   pair (damped oscillation).
//!
//! The branch and every exponential it needs are fixed by the cycle time
//! and motor constants, so `init` computes them once and stores the
//! branch as a tagged variant; the per-cycle run just selects on the tag.
//!
//! Friction: static torque `Tk` applies when the shaft is at rest,
//! sliding torque `Ts` otherwise. A drive torque that cannot break the
//! static friction leaves the rotor stopped.

use gom_math::{GoError, GoResult};

/// Discriminant magnitudes below this count as an identically zero root.
const ROOT_FUZZ: f64 = 1.0e-20;

/// Speeds below this count as stopped for friction selection.
const SPEED_FUZZ: f64 = 1.0e-6;

/// Precomputed voltage-mode solution branch.
#[derive(Debug, Clone, Copy)]
enum VoltageBranch {
    /// Two distinct real roots of the characteristic quadratic.
    Real {
        eb: f64,
        emb: f64,
        root: f64,
        root2_inv: f64,
        rootpb_inv: f64,
        rootmb_inv: f64,
        a2_inv: f64,
    },
    /// Discriminant identically zero: transients are infinitesimal.
    Zero,
    /// Complex pair: damped oscillation.
    Imaginary {
        root: f64,
        mb_2a: f64,
        embt_2a: f64,
        cos_root: f64,
        sin_root: f64,
    },
}

/// DC motor state and precomputed constants.
#[derive(Debug, Clone, Copy)]
pub struct DcMotor {
    // Parameters.
    ra: f64,
    k: f64,
    tl: f64,
    tk: f64,
    ts: f64,
    t: f64,

    // Current-mode precomputes.
    bm_inv: f64,
    bm_jm: f64,
    jm_bm: f64,
    embm_jmt: f64,

    // Voltage-mode precomputes.
    a: f64,
    b: f64,
    c_inv: f64,
    d: f64,
    branch: VoltageBranch,

    // Outputs.
    theta: f64,
    dtheta: f64,
    d2theta: f64,
}

impl DcMotor {
    /// Build a motor from its constants and the simulation cycle time.
    ///
    /// `bm` and `jm` must be positive; the cycle time is baked into the
    /// precomputed exponentials, so changing it means re-initializing
    /// (use [`DcMotor::get`]/[`DcMotor::set`] to carry the state over).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bm: f64,
        la: f64,
        ra: f64,
        jm: f64,
        kb: f64,
        tl: f64,
        tk: f64,
        ts: f64,
        t: f64,
    ) -> GoResult<DcMotor> {
        if bm < f64::EPSILON || jm < f64::EPSILON || t <= 0.0 {
            return Err(GoError::BadArgs);
        }

        let a = la * jm;
        let b = bm * la + ra * jm;
        let c = ra * bm + kb * kb;
        let d = ra * tl;
        if c == 0.0 || a == 0.0 {
            return Err(GoError::BadArgs);
        }

        let disc = b * b - 4.0 * a * c;
        let branch = if disc < -ROOT_FUZZ {
            let root = (-disc).sqrt();
            let mb_2a = -b / (2.0 * a);
            VoltageBranch::Imaginary {
                root,
                mb_2a,
                embt_2a: (t * mb_2a).exp(),
                cos_root: (root * t).cos(),
                sin_root: (root * t).sin(),
            }
        } else if disc > ROOT_FUZZ {
            let root = disc.sqrt();
            VoltageBranch::Real {
                eb: (-(b + root) * t / (2.0 * a)).exp(),
                emb: ((-b + root) * t / (2.0 * a)).exp(),
                root,
                root2_inv: 1.0 / (2.0 * root),
                rootpb_inv: 1.0 / (root + b),
                rootmb_inv: 1.0 / (root - b),
                a2_inv: 1.0 / (2.0 * a),
            }
        } else {
            VoltageBranch::Zero
        };

        let bm_jm = bm / jm;
        Ok(DcMotor {
            ra,
            k: kb,
            tl,
            tk,
            ts,
            t,
            bm_inv: 1.0 / bm,
            bm_jm,
            jm_bm: jm / bm,
            embm_jmt: (-bm_jm * t).exp(),
            a,
            b,
            c_inv: 1.0 / c,
            d,
            branch,
            theta: 0.0,
            dtheta: 0.0,
            d2theta: 0.0,
        })
    }

    /// Shaft position, velocity and acceleration.
    pub fn get(&self) -> (f64, f64, f64) {
        (self.theta, self.dtheta, self.d2theta)
    }

    /// Set the full shaft state, e.g. when changing cycle times.
    pub fn set(&mut self, theta: f64, dtheta: f64, d2theta: f64) {
        self.theta = theta;
        self.dtheta = dtheta;
        self.d2theta = d2theta;
    }

    /// Set only the shaft position.
    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
    }

    /// Subtract the applicable friction torque from the driving term.
    /// Returns `None` when the rotor stays stopped.
    fn apply_friction(&mut self, rhs: f64, frictorq: f64) -> Option<f64> {
        let stopped = self.dtheta.abs() < SPEED_FUZZ;
        if rhs > frictorq {
            Some(rhs - frictorq)
        } else if rhs < -frictorq {
            Some(rhs + frictorq)
        } else if stopped {
            self.dtheta = 0.0;
            self.d2theta = 0.0;
            None
        } else {
            Some(0.0)
        }
    }

    fn friction_torque(&self, scale: f64) -> f64 {
        if self.dtheta.abs() < SPEED_FUZZ { scale * self.tk } else { scale * self.ts }
    }

    /// Advance one cycle with a constant armature voltage.
    pub fn run_voltage_cycle(&mut self, v: f64) {
        let frictorq = self.friction_torque(self.ra);
        let rhs = match self.apply_friction(v * self.k - self.d, frictorq) {
            Some(r) => r,
            None => return,
        };

        match self.branch {
            VoltageBranch::Imaginary { root, mb_2a, embt_2a, cos_root, sin_root } => {
                // c1 here is C1 + C2 of the complex pair.
                let c1 = self.dtheta - rhs * self.c_inv;
                let c3 = self.theta + c1 * self.b * 0.5 * self.c_inv;
                self.theta = rhs * self.t * self.c_inv
                    + self.a * self.c_inv * c1 * embt_2a * (mb_2a * cos_root + root * sin_root)
                    + c3;
                self.dtheta = rhs * self.c_inv + embt_2a * c1 * cos_root;
                self.d2theta = c1 * embt_2a * (mb_2a * cos_root - root * sin_root);
            }
            VoltageBranch::Real { eb, emb, root, root2_inv, rootpb_inv, rootmb_inv, a2_inv } => {
                let c2 = ((self.b + root) * (rhs * self.c_inv - self.dtheta)
                    - 2.0 * self.a * self.d2theta)
                    * root2_inv;
                let c1 = -(rhs * self.c_inv) + self.dtheta - c2;
                let c3 = self.theta + (2.0 * self.a * c1) * rootpb_inv
                    - (2.0 * self.a * c2) * rootmb_inv;
                self.theta = rhs * self.t * self.c_inv - (2.0 * self.a * eb * c1) * rootpb_inv
                    + (2.0 * self.a * emb * c2) * rootmb_inv
                    + c3;
                self.dtheta = rhs * self.c_inv + eb * c1 + emb * c2;
                self.d2theta =
                    (-(self.b + root) * eb * c1 + (-self.b + root) * emb * c2) * a2_inv;
            }
            VoltageBranch::Zero => {
                self.dtheta = rhs * self.c_inv;
                self.theta += self.dtheta * self.t;
                // Transients are infinitesimal; acceleration stays zero.
            }
        }
    }

    /// Advance one cycle with a constant armature current.
    pub fn run_current_cycle(&mut self, i: f64) {
        let frictorq = self.friction_torque(1.0);
        let rhs = match self.apply_friction(i * self.k - self.tl, frictorq) {
            Some(r) => r,
            None => return,
        };

        let rhs = rhs * self.bm_inv;
        let c1 = self.dtheta - rhs;
        let c2 = self.theta + self.jm_bm * c1;
        self.theta = rhs * self.t - c1 * self.jm_bm * self.embm_jmt + c2;
        self.dtheta = rhs + c1 * self.embm_jmt;
        self.d2theta = -c1 * self.bm_jm * self.embm_jmt;
    }

    /// Steady-state velocity under a constant voltage, from the Laplace
    /// limit: `K v - Ra Tl` over `K^2 + Ra Bm`.
    pub fn steady_state_velocity(&self, v: f64) -> f64 {
        (self.k * v - self.d) * self.c_inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inland Motor BM-3503.
    fn bm3503(t: f64) -> DcMotor {
        DcMotor::new(6.129, 0.00035, 0.028, 0.00707, 0.414, 0.0, 0.0, 0.0, t).unwrap()
    }

    /// Parameters chosen to put the discriminant below zero, exercising
    /// the oscillatory branch.
    fn underdamped(t: f64) -> DcMotor {
        DcMotor::new(0.01, 0.01, 0.01, 0.01, 1.0, 0.0, 0.0, 0.0, t).unwrap()
    }

    #[test]
    fn voltage_converges_to_steady_state() {
        for motor_fn in [bm3503 as fn(f64) -> DcMotor, underdamped] {
            let mut m = motor_fn(0.001);
            let v = 10.0;
            let expect = m.steady_state_velocity(v);
            for _ in 0..20_000 {
                m.run_voltage_cycle(v);
            }
            let (_, w, _) = m.get();
            assert!(
                (w - expect).abs() < 1e-3 * expect.abs().max(1.0),
                "w = {w}, expected {expect}"
            );
        }
    }

    #[test]
    fn current_converges_to_steady_state() {
        let mut m = bm3503(0.001);
        let i = 2.0;
        // Steady velocity for current mode: (i K - Tl) / Bm.
        let expect = i * 0.414 / 6.129;
        for _ in 0..20_000 {
            m.run_current_cycle(i);
        }
        let (_, w, _) = m.get();
        assert!((w - expect).abs() < 1e-6 * expect.abs().max(1.0));
    }

    #[test]
    fn position_integrates_velocity() {
        let mut m = bm3503(0.001);
        let v = 5.0;
        for _ in 0..50_000 {
            m.run_voltage_cycle(v);
        }
        let (theta1, w, _) = m.get();
        // Another second of steady running adds w * 1s.
        for _ in 0..1000 {
            m.run_voltage_cycle(v);
        }
        let (theta2, _, _) = m.get();
        assert!((theta2 - theta1 - w).abs() < 1e-3 * w.abs());
    }

    #[test]
    fn static_friction_holds_the_rotor() {
        let mut m =
            DcMotor::new(6.129, 0.00035, 0.028, 0.00707, 0.414, 0.0, 10.0, 5.0, 0.001).unwrap();
        // Drive torque K*v below the static threshold Ra*Tk.
        let v = 0.1;
        assert!(v * 0.414 < 0.028 * 10.0);
        for _ in 0..1000 {
            m.run_voltage_cycle(v);
        }
        let (theta, w, _) = m.get();
        assert_eq!(theta, 0.0);
        assert_eq!(w, 0.0);
    }

    #[test]
    fn strong_drive_breaks_static_friction() {
        let mut m =
            DcMotor::new(6.129, 0.00035, 0.028, 0.00707, 0.414, 0.0, 10.0, 5.0, 0.001).unwrap();
        let v = 10.0;
        assert!(v * 0.414 > 0.028 * 10.0);
        for _ in 0..1000 {
            m.run_voltage_cycle(v);
        }
        let (_, w, _) = m.get();
        assert!(w > 0.0);
    }

    #[test]
    fn state_transfer_across_cycle_times() {
        let mut m1 = bm3503(0.001);
        for _ in 0..500 {
            m1.run_voltage_cycle(3.0);
        }
        let (th, w, al) = m1.get();
        let mut m2 = bm3503(0.0005);
        m2.set(th, w, al);
        let (th2, w2, _) = m2.get();
        assert_eq!(th, th2);
        assert_eq!(w, w2);
        // Continue without a discontinuity.
        m2.run_voltage_cycle(3.0);
        let (th3, _, _) = m2.get();
        assert!((th3 - th).abs() < w.abs() * 0.001 + 1e-6);
    }

    #[test]
    fn degenerate_parameters_rejected() {
        assert!(DcMotor::new(0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.001).is_err());
        assert!(DcMotor::new(1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.001).is_err());
        assert!(DcMotor::new(1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.001).is_err());
    }
}
