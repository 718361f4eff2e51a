//! Stub backend: a pass-through integrator per joint.
//!
//! The velocity output is integrated directly into the position, the
//! pass-through setpoint mode is honored, and homing latches at the
//! current position on the next query. Pure software tests use this when
//! they want the loop plumbing without motor dynamics.

use gom_common::consts::MAX_JOINTS;
use gom_math::{GoError, GoResult};

use crate::ExtInterface;

pub const NAME: &str = "stub";

#[derive(Debug, Clone, Copy, Default)]
struct StubJoint {
    pos: f64,
    cycle_time: f64,
    homing: bool,
    homed: bool,
    home_latch: f64,
    active: bool,
}

/// Loopback external interface.
#[derive(Debug)]
pub struct StubInterface {
    joints: [StubJoint; MAX_JOINTS],
}

impl StubInterface {
    pub fn new() -> Self {
        Self { joints: [StubJoint::default(); MAX_JOINTS] }
    }

    fn joint_mut(&mut self, joint: usize) -> GoResult<&mut StubJoint> {
        let j = self.joints.get_mut(joint).ok_or(GoError::RangeError)?;
        if !j.active {
            return Err(GoError::RangeError);
        }
        Ok(j)
    }
}

impl Default for StubInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtInterface for StubInterface {
    fn init(&mut self, _init_string: &str) -> GoResult<()> {
        Ok(())
    }

    fn quit(&mut self) -> GoResult<()> {
        self.joints = [StubJoint::default(); MAX_JOINTS];
        Ok(())
    }

    fn joint_init(&mut self, joint: usize, cycle_time: f64) -> GoResult<()> {
        let j = self.joints.get_mut(joint).ok_or(GoError::RangeError)?;
        *j = StubJoint { cycle_time, active: true, ..StubJoint::default() };
        Ok(())
    }

    fn joint_enable(&mut self, joint: usize) -> GoResult<()> {
        self.joint_mut(joint).map(|_| ())
    }

    fn joint_disable(&mut self, joint: usize) -> GoResult<()> {
        self.joint_mut(joint).map(|_| ())
    }

    fn joint_quit(&mut self, joint: usize) -> GoResult<()> {
        let j = self.joints.get_mut(joint).ok_or(GoError::RangeError)?;
        j.active = false;
        Ok(())
    }

    fn read_pos(&mut self, joint: usize, pos: &mut f64) -> GoResult<()> {
        *pos = self.joint_mut(joint)?.pos;
        Ok(())
    }

    fn write_pos(&mut self, joint: usize, pos: f64) -> GoResult<()> {
        self.joint_mut(joint)?.pos = pos;
        Ok(())
    }

    fn write_vel(&mut self, joint: usize, vel: f64) -> GoResult<()> {
        let j = self.joint_mut(joint)?;
        j.pos += vel * j.cycle_time;
        Ok(())
    }

    fn joint_home(&mut self, joint: usize) -> GoResult<()> {
        let j = self.joint_mut(joint)?;
        j.homing = true;
        j.homed = false;
        Ok(())
    }

    fn joint_is_home(&mut self, joint: usize) -> bool {
        let Ok(j) = self.joint_mut(joint) else {
            return false;
        };
        if j.homing {
            j.homing = false;
            j.homed = true;
            j.home_latch = j.pos;
        }
        j.homed
    }

    fn joint_home_latch(&mut self, joint: usize, pos: &mut f64) -> GoResult<()> {
        *pos = self.joint_mut(joint)?.home_latch;
        Ok(())
    }

    fn num_ain(&self) -> usize {
        0
    }

    fn num_aout(&self) -> usize {
        0
    }

    fn num_din(&self) -> usize {
        0
    }

    fn num_dout(&self) -> usize {
        0
    }

    fn trigger_in(&mut self) -> GoResult<()> {
        Ok(())
    }

    fn read_ain(&mut self, _index: usize, _value: &mut f64) -> GoResult<()> {
        Err(GoError::RangeError)
    }

    fn write_aout(&mut self, _index: usize, _value: f64) -> GoResult<()> {
        Err(GoError::RangeError)
    }

    fn read_din(&mut self, _index: usize, _value: &mut bool) -> GoResult<()> {
        Err(GoError::RangeError)
    }

    fn write_dout(&mut self, _index: usize, _value: bool) -> GoResult<()> {
        Err(GoError::RangeError)
    }

    fn set_parameters(&mut self, joint: usize, _values: &[f64]) -> GoResult<()> {
        self.joint_mut(joint).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrates_velocity() {
        let mut s = StubInterface::new();
        s.init("").unwrap();
        s.joint_init(0, 0.01).unwrap();
        for _ in 0..100 {
            s.write_vel(0, 2.0).unwrap();
        }
        let mut p = 0.0;
        s.read_pos(0, &mut p).unwrap();
        assert!((p - 2.0).abs() < 1e-9);
    }

    #[test]
    fn pass_through_setpoint() {
        let mut s = StubInterface::new();
        s.init("").unwrap();
        s.joint_init(0, 0.01).unwrap();
        s.write_pos(0, 0.37).unwrap();
        let mut p = 0.0;
        s.read_pos(0, &mut p).unwrap();
        assert_eq!(p, 0.37);
    }

    #[test]
    fn homing_latches_current_position() {
        let mut s = StubInterface::new();
        s.init("").unwrap();
        s.joint_init(0, 0.01).unwrap();
        s.write_pos(0, 0.37).unwrap();
        s.joint_home(0).unwrap();
        assert!(s.joint_is_home(0));
        let mut latch = 0.0;
        s.joint_home_latch(0, &mut latch).unwrap();
        assert_eq!(latch, 0.37);
    }
}
