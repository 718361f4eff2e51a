//! Serial-chain kinematics over DH links.
//!
//! Forward kinematics composes the link poses; the Jacobian is the
//! geometric one built from each joint's axis and origin; the inverse
//! iterates damped Newton-Raphson steps from the caller's seed until the
//! pose error is inside tolerance, reporting `Singular` when the
//! iteration cap runs out.

use gom_common::consts::MAX_JOINTS;
use gom_math::{Cart, GoError, GoResult, Link, Matrix, Pose, Quantity, Twist};

use crate::{KinType, Kinematics, check_joints};

pub const NAME: &str = "serial";

/// Iteration cap for the Newton inverse.
const INV_MAX_ITER: usize = 120;
/// Translational convergence tolerance.
const INV_TRAN_TOL: f64 = 1.0e-8;
/// Rotational convergence tolerance.
const INV_ROT_TOL: f64 = 1.0e-8;
/// Damping for the pseudoinverse.
const LAMBDA_SQ: f64 = 1.0e-8;

/// Serial chain described by its link table.
#[derive(Debug)]
pub struct SerialKin {
    links: heapless::Vec<Link, MAX_JOINTS>,
}

impl SerialKin {
    pub fn new() -> Self {
        Self { links: heapless::Vec::new() }
    }

    /// Poses of every link frame in the base frame, joints applied.
    fn frames(&self, joints: &[f64], out: &mut [Pose; MAX_JOINTS]) {
        let mut acc = Pose::IDENTITY;
        for (i, link) in self.links.iter().enumerate() {
            acc = acc.compose(&link.to_pose(joints[i]));
            out[i] = acc;
        }
    }

    /// Geometric Jacobian: 6 rows (v over w), one column per joint.
    fn jacobian(&self, joints: &[f64]) -> GoResult<Matrix> {
        let n = self.links.len();
        let mut frames = [Pose::IDENTITY; MAX_JOINTS];
        self.frames(joints, &mut frames);
        let p_end = frames[n - 1].tran;

        let mut jac = Matrix::new(6, n)?;
        for (i, link) in self.links.iter().enumerate() {
            let frame = frames[i];
            let z = frame.rot.rotate(&Cart::new(0.0, 0.0, 1.0));
            let (lin, ang) = match link.quantity {
                Quantity::Angle => (z.cross(&p_end.sub(&frame.tran)), z),
                Quantity::Length => (z, Cart::ZERO),
            };
            jac.el[0][i] = lin.x;
            jac.el[1][i] = lin.y;
            jac.el[2][i] = lin.z;
            jac.el[3][i] = ang.x;
            jac.el[4][i] = ang.y;
            jac.el[5][i] = ang.z;
        }
        Ok(jac)
    }

    /// Damped least-squares solve of `J qdot = twist`.
    fn solve_rates(&self, jac: &Matrix, twist: &[f64; 6], qdot: &mut [f64]) -> GoResult<()> {
        let n = jac.cols;
        let jt = jac.transpose();
        let mut a = jt.mul(jac)?;
        for i in 0..n {
            a.el[i][i] += LAMBDA_SQ;
        }
        let mut rhs = [0.0; MAX_JOINTS];
        jt.mul_vec(twist, &mut rhs)?;
        let mut sol = [0.0; MAX_JOINTS];
        a.inv()?.mul_vec(&rhs[..n], &mut sol)?;
        qdot[..n].copy_from_slice(&sol[..n]);
        Ok(())
    }
}

impl Default for SerialKin {
    fn default() -> Self {
        Self::new()
    }
}

impl Kinematics for SerialKin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn kin_type(&self) -> KinType {
        KinType::ForwardOnly
    }

    fn num_joints(&self) -> usize {
        self.links.len()
    }

    fn set_parameters(&mut self, links: &[Link]) -> GoResult<()> {
        if links.is_empty() || links.len() > MAX_JOINTS {
            return Err(GoError::BadArgs);
        }
        self.links.clear();
        for l in links {
            self.links.push(*l).map_err(|_| GoError::BadArgs)?;
        }
        Ok(())
    }

    fn get_parameters(&self) -> &[Link] {
        &self.links
    }

    fn fwd(&self, joints: &[f64], pose: &mut Pose) -> GoResult<()> {
        let n = self.links.len();
        if n == 0 {
            return Err(GoError::Error);
        }
        check_joints(joints.len(), n)?;
        let mut frames = [Pose::IDENTITY; MAX_JOINTS];
        self.frames(joints, &mut frames);
        *pose = frames[n - 1];
        Ok(())
    }

    fn inv(&self, target: &Pose, joints: &mut [f64]) -> GoResult<()> {
        let n = self.links.len();
        if n == 0 {
            return Err(GoError::Error);
        }
        check_joints(joints.len(), n)?;

        let mut q = [0.0; MAX_JOINTS];
        q[..n].copy_from_slice(&joints[..n]);

        for _ in 0..INV_MAX_ITER {
            let mut cur = Pose::IDENTITY;
            self.fwd(&q[..n], &mut cur)?;

            let dt = target.tran.sub(&cur.tran);
            // Rotation error in the world frame.
            let dr = target.rot.mul(&cur.rot.inv()).to_rvec();
            if dt.mag() < INV_TRAN_TOL && dr.mag() < INV_ROT_TOL {
                joints[..n].copy_from_slice(&q[..n]);
                return Ok(());
            }

            let jac = self.jacobian(&q[..n])?;
            let err = [dt.x, dt.y, dt.z, dr.x, dr.y, dr.z];
            let mut step = [0.0; MAX_JOINTS];
            self.solve_rates(&jac, &err, &mut step)?;
            for i in 0..n {
                q[i] += step[i];
            }
        }
        Err(GoError::Singular)
    }

    fn jac_fwd(
        &self,
        joints: &[f64],
        jointvels: &[f64],
        pose: &mut Pose,
        vel: &mut Twist,
    ) -> GoResult<()> {
        let n = self.links.len();
        check_joints(joints.len(), n)?;
        check_joints(jointvels.len(), n)?;
        self.fwd(joints, pose)?;
        let jac = self.jacobian(joints)?;
        let mut out = [0.0; 6];
        jac.mul_vec(&jointvels[..n], &mut out)?;
        vel.v = Cart::new(out[0], out[1], out[2]);
        vel.w = Cart::new(out[3], out[4], out[5]);
        Ok(())
    }

    fn jac_inv(
        &self,
        _pose: &Pose,
        vel: &Twist,
        joints: &[f64],
        jointvels: &mut [f64],
    ) -> GoResult<()> {
        let n = self.links.len();
        check_joints(joints.len(), n)?;
        check_joints(jointvels.len(), n)?;
        let jac = self.jacobian(&joints[..n])?;
        let twist = [vel.v.x, vel.v.y, vel.v.z, vel.w.x, vel.w.y, vel.w.z];
        self.solve_rates(&jac, &twist, jointvels)
    }
}
