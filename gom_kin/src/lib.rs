//! # Go Motion Kinematics
//!
//! The pluggable forward/inverse/Jacobian contract and its bundled
//! implementations. An implementation owns whatever internal state it
//! needs; the traj loop holds it as a boxed trait object selected by name
//! at startup.
//!
//! Bundled implementations:
//! - [`trivial`]: Cartesian pass-through for gantry-style mechanisms and
//!   tests; joints 0..2 are x/y/z, joints 3..5 are roll/pitch/yaw.
//! - [`serial`]: serial chains described by DH links, with a geometric
//!   Jacobian and a damped Newton-Raphson inverse.

pub mod serial;
pub mod trivial;

use gom_common::consts::MAX_JOINTS;
use gom_math::{GoError, GoResult, Link, Pose, Twist};

/// Which directions an implementation can solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KinType {
    /// Forward and inverse are both closed-form or reliable.
    Both,
    /// Forward only; inverse iterates from the Jacobian.
    ForwardOnly,
    /// Inverse only; forward iterates from the Jacobian.
    InverseOnly,
}

/// The kinematics contract.
///
/// Joint slices are always `joint_num()` long. `fwd` may use the pose
/// argument as a starting estimate for iterative solvers, and `inv`
/// treats the incoming joints the same way; both update their output in
/// place so a failed solve leaves the caller's estimate untouched where
/// possible.
pub trait Kinematics: Send + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn kin_type(&self) -> KinType;

    fn num_joints(&self) -> usize;

    /// Replace the link table. The link count becomes the joint count.
    fn set_parameters(&mut self, links: &[Link]) -> GoResult<()>;

    fn get_parameters(&self) -> &[Link];

    /// Joint positions to end pose.
    fn fwd(&self, joints: &[f64], pose: &mut Pose) -> GoResult<()>;

    /// End pose to joint positions, seeded by the incoming values.
    fn inv(&self, pose: &Pose, joints: &mut [f64]) -> GoResult<()>;

    /// Joint velocities to an end-effector twist at the given joints.
    fn jac_fwd(
        &self,
        joints: &[f64],
        jointvels: &[f64],
        pose: &mut Pose,
        vel: &mut Twist,
    ) -> GoResult<()>;

    /// End-effector twist to joint velocities: the pseudoinverse
    /// direction.
    fn jac_inv(
        &self,
        pose: &Pose,
        vel: &Twist,
        joints: &[f64],
        jointvels: &mut [f64],
    ) -> GoResult<()>;
}

/// Select an implementation by its registered name.
///
/// Unknown names report `ImplError`, matching the policy that an absent
/// backend is a configuration mistake rather than a runtime surprise.
pub fn select(name: &str) -> GoResult<Box<dyn Kinematics>> {
    match name {
        trivial::NAME => Ok(Box::new(trivial::TrivialKin::new())),
        serial::NAME => Ok(Box::new(serial::SerialKin::new())),
        _ => Err(GoError::ImplError),
    }
}

/// Names of all bundled implementations.
pub fn available() -> &'static [&'static str] {
    &[trivial::NAME, serial::NAME]
}

/// Shared bound check for joint slices.
pub(crate) fn check_joints(len: usize, n: usize) -> GoResult<()> {
    if len < n || n > MAX_JOINTS {
        return Err(GoError::BadArgs);
    }
    Ok(())
}
