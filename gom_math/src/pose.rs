//! Poses, homogeneous transforms and twists.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::result::GoResult;
use crate::rot::{Mat, Quat};

/// Position and orientation: translation plus canonical quaternion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Pose {
    pub tran: Cart,
    pub rot: Quat,
}

/// Homogeneous form of a pose: translation plus rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Hom {
    pub tran: Cart,
    pub rot: Mat,
}

/// Velocity twist: translational `v` and angular `w`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Twist {
    pub v: Cart,
    pub w: Cart,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        tran: Cart { x: 0.0, y: 0.0, z: 0.0 },
        rot: Quat { s: 1.0, x: 0.0, y: 0.0, z: 0.0 },
    };

    #[inline]
    pub const fn new(tran: Cart, rot: Quat) -> Self {
        Self { tran, rot }
    }

    /// Compose: apply `other` in this pose's frame.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            tran: self.tran.add(&self.rot.rotate(&other.tran)),
            rot: self.rot.mul(&other.rot),
        }
    }

    /// Inverse transform, so `pose.compose(&pose.inv())` is identity.
    pub fn inv(&self) -> Pose {
        let rot = self.rot.inv();
        Pose { tran: rot.rotate(&self.tran).neg(), rot }
    }

    /// Transform a point from this pose's frame to the parent frame.
    #[inline]
    pub fn apply(&self, point: &Cart) -> Cart {
        self.tran.add(&self.rot.rotate(point))
    }

    pub fn to_hom(&self) -> Hom {
        Hom { tran: self.tran, rot: self.rot.to_mat() }
    }

    pub fn is_close(&self, other: &Pose) -> bool {
        self.tran.is_close(&other.tran) && self.rot.is_close(&other.rot)
    }

    /// Renormalize the rotation part; fails on a degenerate quaternion.
    pub fn norm(&self) -> GoResult<Pose> {
        Ok(Pose { tran: self.tran, rot: self.rot.unit()? })
    }
}

impl Hom {
    pub const IDENTITY: Hom = Hom {
        tran: Cart { x: 0.0, y: 0.0, z: 0.0 },
        rot: Mat {
            x: Cart { x: 1.0, y: 0.0, z: 0.0 },
            y: Cart { x: 0.0, y: 1.0, z: 0.0 },
            z: Cart { x: 0.0, y: 0.0, z: 1.0 },
        },
    };

    pub fn compose(&self, other: &Hom) -> Hom {
        Hom {
            tran: self.tran.add(&self.rot.mul_cart(&other.tran)),
            rot: self.rot.mul(&other.rot),
        }
    }

    pub fn inv(&self) -> Hom {
        let rot = self.rot.inv();
        Hom { tran: rot.mul_cart(&self.tran).neg(), rot }
    }

    #[inline]
    pub fn apply(&self, point: &Cart) -> Cart {
        self.tran.add(&self.rot.mul_cart(point))
    }

    pub fn to_pose(&self) -> Pose {
        Pose { tran: self.tran, rot: self.rot.to_quat() }
    }
}

impl Default for Hom {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Twist {
    pub const ZERO: Twist = Twist {
        v: Cart { x: 0.0, y: 0.0, z: 0.0 },
        w: Cart { x: 0.0, y: 0.0, z: 0.0 },
    };

    #[inline]
    pub fn scale(&self, s: f64) -> Twist {
        Twist { v: self.v.scale(s), w: self.w.scale(s) }
    }

    #[inline]
    pub fn add(&self, other: &Twist) -> Twist {
        Twist { v: self.v.add(&other.v), w: self.w.add(&other.w) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rot::Rvec;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn random_pose(rng: &mut StdRng) -> Pose {
        let rvec = Rvec::new(
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
            rng.gen_range(-3.0..3.0),
        );
        Pose {
            tran: Cart::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            ),
            rot: rvec.to_quat(),
        }
    }

    #[test]
    fn pose_inverse_is_identity() {
        let mut rng = StdRng::seed_from_u64(41);
        for _ in 0..10_000 {
            let p = random_pose(&mut rng);
            assert!(p.compose(&p.inv()).is_close(&Pose::IDENTITY));
            assert!(p.inv().compose(&p).is_close(&Pose::IDENTITY));
        }
    }

    #[test]
    fn compose_is_associative() {
        let mut rng = StdRng::seed_from_u64(43);
        // Left-fold and right-fold a chain of 100 poses; the results must
        // agree within accumulated epsilon.
        let chain: Vec<Pose> = (0..100).map(|_| random_pose(&mut rng)).collect();
        let left = chain.iter().fold(Pose::IDENTITY, |acc, p| acc.compose(p));
        let right = chain
            .iter()
            .rev()
            .fold(Pose::IDENTITY, |acc, p| p.compose(&acc));
        assert!((left.tran.x - right.tran.x).abs() < 1e-6);
        assert!((left.tran.y - right.tran.y).abs() < 1e-6);
        assert!((left.tran.z - right.tran.z).abs() < 1e-6);
        assert!(left.rot.mul(&right.rot.inv()).mag() < 1e-6);
    }

    #[test]
    fn hom_matches_pose_composition() {
        let mut rng = StdRng::seed_from_u64(47);
        for _ in 0..1000 {
            let a = random_pose(&mut rng);
            let b = random_pose(&mut rng);
            let via_pose = a.compose(&b);
            let via_hom = a.to_hom().compose(&b.to_hom()).to_pose();
            assert!(via_pose.is_close(&via_hom));
        }
    }

    #[test]
    fn apply_matches_compose() {
        let p = Pose::new(Cart::new(1.0, 2.0, 3.0), Rvec::new(0.0, 0.0, 1.0).to_quat());
        let point = Cart::new(0.5, -0.5, 0.25);
        let expect = p.compose(&Pose::new(point, Quat::IDENTITY)).tran;
        assert!(p.apply(&point).is_close(&expect));
    }
}
