//! Link parameterizations for mechanism description.
//!
//! A [`Link`] says what one joint-to-joint hop of a mechanism looks like:
//! its geometry (Denavit-Hartenberg for serial chains, pose form or
//! base/platform point pair for parallel structures), whether the joint
//! variable is a length or an angle, and the rigid-body data the dynamics
//! layer wants.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::pose::Pose;
use crate::rot::Mat;

/// What the joint variable measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Quantity {
    #[default]
    Length = 0,
    Angle = 1,
}

/// Denavit-Hartenberg parameters, modified (Craig) convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dh {
    pub a: f64,
    pub alpha: f64,
    pub d: f64,
    pub theta: f64,
}

/// Parallel-pose form: the link frame given directly as a pose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pp {
    pub pose: Pose,
}

/// Parallel-kinematics form: matched base and platform attachment points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pk {
    pub base: Cart,
    pub platform: Cart,
}

/// Rigid-body mass properties of a link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub mass: f64,
    /// Inertia tensor about the link frame, row-major.
    pub inertia: [[f64; 3]; 3],
}

impl Default for Body {
    fn default() -> Self {
        Self { mass: 0.0, inertia: [[0.0; 3]; 3] }
    }
}

/// Geometric form of one link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LinkGeom {
    Dh(Dh),
    Pp(Pp),
    Pk(Pk),
}

impl Default for LinkGeom {
    fn default() -> Self {
        Self::Dh(Dh::default())
    }
}

/// One link of a kinematic chain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub quantity: Quantity,
    #[serde(default)]
    pub geom: LinkGeom,
    #[serde(default)]
    pub body: Body,
}

impl Dh {
    /// The pose of this link frame in the previous frame.
    pub fn to_pose(&self) -> Pose {
        let (st, ct) = self.theta.sin_cos();
        let (sa, ca) = self.alpha.sin_cos();
        let rot = Mat {
            x: Cart::new(ct, ca * st, sa * st),
            y: Cart::new(-st, ca * ct, sa * ct),
            z: Cart::new(0.0, -sa, ca),
        };
        Pose {
            tran: Cart::new(self.a, -self.d * sa, self.d * ca),
            rot: rot.to_quat(),
        }
    }

    /// Recover DH parameters from a pose produced by [`Dh::to_pose`].
    pub fn from_pose(pose: &Pose) -> Dh {
        let m = pose.rot.to_mat();
        let theta = (-m.y.x).atan2(m.x.x);
        let alpha = (-m.z.y).atan2(m.z.z);
        let (sa, ca) = alpha.sin_cos();
        let d = if ca.abs() >= sa.abs() { pose.tran.z / ca } else { -pose.tran.y / sa };
        Dh { a: pose.tran.x, alpha, d, theta }
    }
}

impl Link {
    /// The link's frame as a pose, with the joint variable applied.
    ///
    /// For DH links an angle joint adds to `theta` and a length joint adds
    /// to `d`; pose-form links compose a joint rotation about Z or a
    /// translation along Z; point-pair links stretch along the strut.
    pub fn to_pose(&self, joint: f64) -> Pose {
        match self.geom {
            LinkGeom::Dh(dh) => {
                let mut dh = dh;
                match self.quantity {
                    Quantity::Angle => dh.theta += joint,
                    Quantity::Length => dh.d += joint,
                }
                dh.to_pose()
            }
            LinkGeom::Pp(pp) => {
                let joint_pose = match self.quantity {
                    Quantity::Angle => Pose::new(
                        Cart::ZERO,
                        crate::rot::Rvec::new(0.0, 0.0, joint).to_quat(),
                    ),
                    Quantity::Length => Pose::new(Cart::new(0.0, 0.0, joint), Default::default()),
                };
                pp.pose.compose(&joint_pose)
            }
            LinkGeom::Pk(pk) => {
                // Strut from base toward platform, extended by the joint.
                let dir = pk.platform.sub(&pk.base);
                let len = dir.mag();
                let unit = if len > crate::scalar::REAL_EPSILON {
                    dir.scale(1.0 / len)
                } else {
                    Cart::new(0.0, 0.0, 1.0)
                };
                Pose::new(pk.base.add(&unit.scale(len + joint)), Default::default())
            }
        }
    }
}
