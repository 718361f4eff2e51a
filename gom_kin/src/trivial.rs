//! Cartesian pass-through kinematics.
//!
//! Joints 0..2 map to x/y/z and joints 3..5 to roll/pitch/yaw. With fewer
//! than six joints the remaining pose coordinates are zero. This is the
//! identity mechanism used by gantries and by the test scenarios.

use gom_math::{Cart, GoResult, Link, Pose, Rpy, Twist};

use crate::{KinType, Kinematics, check_joints};

pub const NAME: &str = "trivial";

/// Pass-through implementation. The link table is carried only so
/// configuration can round-trip.
#[derive(Debug)]
pub struct TrivialKin {
    links: heapless::Vec<Link, { gom_common::consts::MAX_JOINTS }>,
}

impl TrivialKin {
    pub fn new() -> Self {
        let mut links = heapless::Vec::new();
        for _ in 0..6 {
            // Six pass-through axes by default.
            let _ = links.push(Link::default());
        }
        Self { links }
    }
}

impl Default for TrivialKin {
    fn default() -> Self {
        Self::new()
    }
}

impl Kinematics for TrivialKin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn kin_type(&self) -> KinType {
        KinType::Both
    }

    fn num_joints(&self) -> usize {
        self.links.len()
    }

    fn set_parameters(&mut self, links: &[Link]) -> GoResult<()> {
        check_joints(links.len(), links.len())?;
        self.links.clear();
        for l in links {
            self.links.push(*l).map_err(|_| gom_math::GoError::BadArgs)?;
        }
        Ok(())
    }

    fn get_parameters(&self) -> &[Link] {
        &self.links
    }

    fn fwd(&self, joints: &[f64], pose: &mut Pose) -> GoResult<()> {
        let n = self.num_joints();
        check_joints(joints.len(), n)?;
        let get = |i: usize| if i < n { joints[i] } else { 0.0 };
        pose.tran = Cart::new(get(0), get(1), get(2));
        pose.rot = Rpy { r: get(3), p: get(4), y: get(5) }.to_quat();
        Ok(())
    }

    fn inv(&self, pose: &Pose, joints: &mut [f64]) -> GoResult<()> {
        let n = self.num_joints();
        check_joints(joints.len(), n)?;
        let rpy = pose.rot.to_rpy();
        let values = [pose.tran.x, pose.tran.y, pose.tran.z, rpy.r, rpy.p, rpy.y];
        for i in 0..n.min(6) {
            joints[i] = values[i];
        }
        for j in joints.iter_mut().take(n).skip(6) {
            *j = 0.0;
        }
        Ok(())
    }

    fn jac_fwd(
        &self,
        joints: &[f64],
        jointvels: &[f64],
        pose: &mut Pose,
        vel: &mut Twist,
    ) -> GoResult<()> {
        let n = self.num_joints();
        check_joints(joints.len(), n)?;
        check_joints(jointvels.len(), n)?;
        self.fwd(joints, pose)?;
        let get = |i: usize| if i < n { jointvels[i] } else { 0.0 };
        vel.v = Cart::new(get(0), get(1), get(2));
        vel.w = Cart::new(get(3), get(4), get(5));
        Ok(())
    }

    fn jac_inv(
        &self,
        _pose: &Pose,
        vel: &Twist,
        joints: &[f64],
        jointvels: &mut [f64],
    ) -> GoResult<()> {
        let n = self.num_joints();
        check_joints(joints.len(), n)?;
        check_joints(jointvels.len(), n)?;
        let values = [vel.v.x, vel.v.y, vel.v.z, vel.w.x, vel.w.y, vel.w.z];
        for i in 0..n.min(6) {
            jointvels[i] = values[i];
        }
        for v in jointvels.iter_mut().take(n).skip(6) {
            *v = 0.0;
        }
        Ok(())
    }
}
