//! Per-joint PID with feedforward.
//!
//! `u = Kp e + integral + Kd d/dt(-feedback) + Kff_v v_set + Kff_a a_set`,
//! with the integral clamped at `+/- i_max` and the output at
//! `+/- out_max`. The derivative acts on the measured feedback through a
//! first-order filter (`tf`), so setpoint steps do not kick the output.
//! Zero `ki` disables the integral, zero `kd` the derivative.

/// Gains and clamps for one joint.
#[derive(Debug, Clone, Copy)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Velocity feedforward.
    pub vff: f64,
    /// Acceleration feedforward.
    pub aff: f64,
    /// Integrator clamp.
    pub i_max: f64,
    /// Symmetric output clamp.
    pub out_max: f64,
    /// Derivative filter time constant [s]; 0 disables the filter.
    pub tf: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            vff: 0.0,
            aff: 0.0,
            i_max: 1.0e6,
            out_max: 1.0e6,
            tf: 0.0,
        }
    }
}

/// Controller state carried across cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pid {
    integral: f64,
    prev_feedback: f64,
    feedback_rate_filtered: f64,
    primed: bool,
}

impl Pid {
    /// Reset all internal state to zero. Required on disable and on
    /// re-init so a stale integral cannot kick the drive.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Compute one cycle.
    ///
    /// - `error`: setpoint - feedback.
    /// - `feedback`: measured position, for the derivative term.
    /// - `ff_vel`, `ff_acc`: commanded velocity/acceleration from the
    ///   interpolator.
    pub fn compute(
        &mut self,
        gains: &PidGains,
        error: f64,
        feedback: f64,
        ff_vel: f64,
        ff_acc: f64,
        dt: f64,
    ) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }

        let p_term = gains.kp * error;

        let i_term = if gains.ki != 0.0 {
            self.integral = (self.integral + gains.ki * error * dt).clamp(-gains.i_max, gains.i_max);
            self.integral
        } else {
            self.integral = 0.0;
            0.0
        };

        let d_term = if gains.kd != 0.0 {
            let raw_rate = if self.primed { (feedback - self.prev_feedback) / dt } else { 0.0 };
            if gains.tf > 0.0 {
                let alpha = dt / (gains.tf + dt);
                self.feedback_rate_filtered += alpha * (raw_rate - self.feedback_rate_filtered);
                -gains.kd * self.feedback_rate_filtered
            } else {
                -gains.kd * raw_rate
            }
        } else {
            self.feedback_rate_filtered = 0.0;
            0.0
        };

        self.prev_feedback = feedback;
        self.primed = true;

        let out = p_term + i_term + d_term + gains.vff * ff_vel + gains.aff * ff_acc;
        out.clamp(-gains.out_max, gains.out_max)
    }
}
