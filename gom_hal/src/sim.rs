//! Simulation backend: one DC motor per joint.
//!
//! The servo output drives the motor model in current mode; positions
//! read back come from the simulated shaft. Homing is modeled as an
//! index mark every [`ROLLOVER`] units of travel: once homing is
//! requested, the first crossing of a rollover boundary latches the
//! boundary position. An init string starting with `I` makes every home
//! request latch immediately at the current position, which keeps tests
//! that don't care about homing motion short.

use gom_common::config::MotorCfg;
use gom_common::consts::{MAX_JOINTS, SIM_AIN_NUM, SIM_AOUT_NUM, SIM_DIN_NUM, SIM_DOUT_NUM};
use gom_math::{GoError, GoResult};
use tracing::debug;

use crate::ExtInterface;
use crate::dcmotor::DcMotor;

pub const NAME: &str = "sim";

/// Travel between simulated index marks.
pub const ROLLOVER: f64 = 0.1;

#[derive(Debug)]
struct SimJoint {
    motor: DcMotor,
    cycle_time: f64,
    old_pos: f64,
    homing: bool,
    homed: bool,
    home_latch: f64,
    enabled: bool,
}

/// The simulated external interface.
#[derive(Debug)]
pub struct SimInterface {
    joints: [Option<SimJoint>; MAX_JOINTS],
    home_immediate: bool,
    ain: [f64; SIM_AIN_NUM],
    ain_incr: [f64; SIM_AIN_NUM],
    aout: [f64; SIM_AOUT_NUM],
    din: [bool; SIM_DIN_NUM],
    dout: [bool; SIM_DOUT_NUM],
}

impl SimInterface {
    pub fn new() -> Self {
        Self {
            joints: Default::default(),
            home_immediate: false,
            ain: [0.0; SIM_AIN_NUM],
            ain_incr: [0.0; SIM_AIN_NUM],
            aout: [0.0; SIM_AOUT_NUM],
            din: [false; SIM_DIN_NUM],
            dout: [false; SIM_DOUT_NUM],
        }
    }

    fn joint_mut(&mut self, joint: usize) -> GoResult<&mut SimJoint> {
        self.joints
            .get_mut(joint)
            .and_then(Option::as_mut)
            .ok_or(GoError::RangeError)
    }

    /// Nearest rollover boundary at or below `pos`.
    fn bin(pos: f64) -> f64 {
        let mut m = pos % ROLLOVER;
        if m < 0.0 {
            m += ROLLOVER;
        }
        pos - m
    }
}

impl Default for SimInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtInterface for SimInterface {
    fn init(&mut self, init_string: &str) -> GoResult<()> {
        self.home_immediate = init_string.starts_with('I');
        for (i, incr) in self.ain_incr.iter_mut().enumerate() {
            *incr = (i + 1) as f64 * 0.001;
        }
        self.ain = [0.0; SIM_AIN_NUM];
        self.din = [false; SIM_DIN_NUM];
        Ok(())
    }

    fn quit(&mut self) -> GoResult<()> {
        self.joints = Default::default();
        Ok(())
    }

    fn joint_init(&mut self, joint: usize, cycle_time: f64) -> GoResult<()> {
        if joint >= MAX_JOINTS {
            return Err(GoError::RangeError);
        }
        let cfg = MotorCfg::default();
        let mut motor =
            DcMotor::new(cfg.bm, cfg.la, cfg.ra, cfg.jm, cfg.kb, cfg.tl, cfg.tk, cfg.ts, cycle_time)?;
        // An arbitrary, distinct starting position per joint, so nothing
        // accidentally assumes everything begins at zero.
        motor.set_theta(joint as f64);
        self.joints[joint] = Some(SimJoint {
            motor,
            cycle_time,
            old_pos: joint as f64,
            homing: false,
            homed: false,
            home_latch: 0.0,
            enabled: false,
        });
        debug!(joint, cycle_time, "sim joint initialized");
        Ok(())
    }

    fn joint_enable(&mut self, joint: usize) -> GoResult<()> {
        self.joint_mut(joint)?.enabled = true;
        Ok(())
    }

    fn joint_disable(&mut self, joint: usize) -> GoResult<()> {
        self.joint_mut(joint)?.enabled = false;
        Ok(())
    }

    fn joint_quit(&mut self, joint: usize) -> GoResult<()> {
        if joint >= MAX_JOINTS {
            return Err(GoError::RangeError);
        }
        self.joints[joint] = None;
        Ok(())
    }

    fn read_pos(&mut self, joint: usize, pos: &mut f64) -> GoResult<()> {
        let j = self.joint_mut(joint)?;
        *pos = j.motor.get().0;
        Ok(())
    }

    fn write_pos(&mut self, _joint: usize, _pos: f64) -> GoResult<()> {
        // The sim models a closed-loop drive; there is no pass-through.
        Err(GoError::ImplError)
    }

    fn write_vel(&mut self, joint: usize, vel: f64) -> GoResult<()> {
        let j = self.joint_mut(joint)?;
        j.old_pos = j.motor.get().0;
        // A disabled drive coasts: the shaft still obeys the motor
        // dynamics, just with no armature current.
        let drive = if j.enabled { vel } else { 0.0 };
        j.motor.run_current_cycle(drive);
        Ok(())
    }

    fn joint_home(&mut self, joint: usize) -> GoResult<()> {
        let j = self.joint_mut(joint)?;
        j.homing = true;
        j.homed = false;
        Ok(())
    }

    fn joint_is_home(&mut self, joint: usize) -> bool {
        let immediate = self.home_immediate;
        let Ok(j) = self.joint_mut(joint) else {
            return false;
        };
        if j.homed {
            return true;
        }
        if !j.homing {
            return false;
        }
        let now_pos = j.motor.get().0;
        if immediate {
            j.homing = false;
            j.homed = true;
            j.home_latch = now_pos;
            return true;
        }
        let old_bin = Self::bin(j.old_pos);
        let now_bin = Self::bin(now_pos);
        if old_bin != now_bin {
            // Crossed an index mark; latch its position.
            j.homing = false;
            j.homed = true;
            j.home_latch = now_bin;
            debug!(joint, latch = now_bin, "sim joint homed");
            return true;
        }
        false
    }

    fn joint_home_latch(&mut self, joint: usize, pos: &mut f64) -> GoResult<()> {
        *pos = self.joint_mut(joint)?.home_latch;
        Ok(())
    }

    fn num_ain(&self) -> usize {
        SIM_AIN_NUM
    }

    fn num_aout(&self) -> usize {
        SIM_AOUT_NUM
    }

    fn num_din(&self) -> usize {
        SIM_DIN_NUM
    }

    fn num_dout(&self) -> usize {
        SIM_DOUT_NUM
    }

    fn trigger_in(&mut self) -> GoResult<()> {
        // Bounce the analog inputs between their rails and tie the first
        // digital inputs to the bounce direction, so clients have
        // something moving to look at.
        for i in 0..SIM_AIN_NUM {
            self.ain[i] += self.ain_incr[i];
            if self.ain[i] > 10.0 {
                self.ain[i] = 10.0;
                self.ain_incr[i] = -self.ain_incr[i];
            } else if self.ain[i] < -10.0 {
                self.ain[i] = -10.0;
                self.ain_incr[i] = -self.ain_incr[i];
            }
        }
        for i in 0..SIM_DIN_NUM {
            if i < SIM_AIN_NUM {
                self.din[i] = self.ain_incr[i] > 0.0;
            }
        }
        Ok(())
    }

    fn read_ain(&mut self, index: usize, value: &mut f64) -> GoResult<()> {
        *value = *self.ain.get(index).ok_or(GoError::RangeError)?;
        Ok(())
    }

    fn write_aout(&mut self, index: usize, value: f64) -> GoResult<()> {
        *self.aout.get_mut(index).ok_or(GoError::RangeError)? = value;
        Ok(())
    }

    fn read_din(&mut self, index: usize, value: &mut bool) -> GoResult<()> {
        *value = *self.din.get(index).ok_or(GoError::RangeError)?;
        Ok(())
    }

    fn write_dout(&mut self, index: usize, value: bool) -> GoResult<()> {
        *self.dout.get_mut(index).ok_or(GoError::RangeError)? = value;
        Ok(())
    }

    /// Values arrive in [`MotorCfg`] field order: Bm, La, Ra, Jm, Kb,
    /// Tl, Tk, Ts; trailing values may be omitted. The motor state is
    /// carried across the rebuild.
    fn set_parameters(&mut self, joint: usize, values: &[f64]) -> GoResult<()> {
        let j = self.joint_mut(joint)?;
        let cycle_time = j.cycle_time;
        let defaults = MotorCfg::default();
        let get = |i: usize, d: f64| values.get(i).copied().unwrap_or(d);
        let mut motor = DcMotor::new(
            get(0, defaults.bm),
            get(1, defaults.la),
            get(2, defaults.ra),
            get(3, defaults.jm),
            get(4, defaults.kb),
            get(5, defaults.tl),
            get(6, defaults.tk),
            get(7, defaults.ts),
            cycle_time,
        )?;
        let (th, w, al) = j.motor.get();
        motor.set(th, w, al);
        j.motor = motor;
        Ok(())
    }
}
