//! Rotation representations and their conversions.
//!
//! Six interchangeable forms: unit quaternion [`Quat`], rotation vector
//! [`Rvec`], 3x3 matrix [`Mat`], and the Euler-like [`Rpy`], [`Zyz`],
//! [`Zyx`] and [`Uxz`] forms. The quaternion is the hub: every form
//! converts to and from it, and the matrix has direct paths where the
//! controller needs them hot.
//!
//! Quaternions are canonical: unit norm with `s >= 0`, so every rotation
//! has exactly one representation and the rotation angle is always in
//! [0, pi].

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::result::{GoError, GoResult};
use crate::scalar::{REAL_EPSILON, cap_unity, is_tiny};

// ─── Types ──────────────────────────────────────────────────────────

/// Unit quaternion, canonical hemisphere (`s >= 0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quat {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Rotation vector: direction is the axis, magnitude is the angle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Rvec {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 3x3 rotation matrix stored as three column vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat {
    pub x: Cart,
    pub y: Cart,
    pub z: Cart,
}

/// Roll-pitch-yaw: fixed-axis X, Y, Z rotations, applied in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rpy {
    pub r: f64,
    pub p: f64,
    pub y: f64,
}

/// Euler ZYZ: moving-axis Z, Y, Z rotations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Zyz {
    pub z: f64,
    pub y: f64,
    pub zp: f64,
}

/// Euler ZYX: moving-axis Z, Y, X rotations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Zyx {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

/// Rotation given by its X and Z direction vectors; Y completes the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uxz {
    pub x: Cart,
    pub z: Cart,
}

// ─── Quat ───────────────────────────────────────────────────────────

impl Quat {
    pub const IDENTITY: Quat = Quat { s: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    /// Normalize into the canonical form: unit norm, `s >= 0`.
    ///
    /// A zero quaternion has no direction and yields `NormError`.
    pub fn unit(&self) -> GoResult<Quat> {
        let m = (self.s * self.s + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if m < REAL_EPSILON {
            return Err(GoError::NormError);
        }
        let sign = if self.s < 0.0 { -1.0 } else { 1.0 };
        let inv = sign / m;
        Ok(Quat { s: self.s * inv, x: self.x * inv, y: self.y * inv, z: self.z * inv })
    }

    /// True if unit norm within epsilon and on the canonical hemisphere.
    pub fn is_norm(&self) -> bool {
        self.s >= 0.0
            && is_tiny(
                self.s * self.s + self.x * self.x + self.y * self.y + self.z * self.z - 1.0,
            )
    }

    /// Rotation angle in [0, pi].
    pub fn mag(&self) -> f64 {
        let vmag = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        2.0 * vmag.atan2(self.s)
    }

    /// Quaternion product, canonicalized.
    pub fn mul(&self, other: &Quat) -> Quat {
        let a = self;
        let b = other;
        let q = Quat {
            s: a.s * b.s - a.x * b.x - a.y * b.y - a.z * b.z,
            x: a.s * b.x + a.x * b.s + a.y * b.z - a.z * b.y,
            y: a.s * b.y - a.x * b.z + a.y * b.s + a.z * b.x,
            z: a.s * b.z + a.x * b.y - a.y * b.x + a.z * b.s,
        };
        if q.s < 0.0 {
            Quat { s: -q.s, x: -q.x, y: -q.y, z: -q.z }
        } else {
            q
        }
    }

    /// Inverse rotation. For a unit quaternion this is the conjugate.
    #[inline]
    pub fn inv(&self) -> Quat {
        Quat { s: self.s, x: -self.x, y: -self.y, z: -self.z }
    }

    /// Rotate a Cartesian vector.
    pub fn rotate(&self, v: &Cart) -> Cart {
        // v' = v + 2 s (qv x v) + 2 qv x (qv x v)
        let qv = Cart::new(self.x, self.y, self.z);
        let t = qv.cross(v).scale(2.0);
        v.add(&t.scale(self.s)).add(&qv.cross(&t))
    }

    /// Raise this rotation to a real power: same axis, scaled angle.
    ///
    /// Used by the queue for shortest-arc attitude interpolation.
    pub fn pow(&self, t: f64) -> Quat {
        let vmag = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if vmag < REAL_EPSILON {
            return Quat::IDENTITY;
        }
        let half = vmag.atan2(self.s) * t;
        let k = half.sin() / vmag;
        let q = Quat { s: half.cos(), x: self.x * k, y: self.y * k, z: self.z * k };
        if q.s < 0.0 {
            Quat { s: -q.s, x: -q.x, y: -q.y, z: -q.z }
        } else {
            q
        }
    }

    pub fn to_rvec(&self) -> Rvec {
        let vmag = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if vmag < REAL_EPSILON {
            return Rvec::default();
        }
        let angle = 2.0 * vmag.atan2(self.s);
        let k = angle / vmag;
        Rvec { x: self.x * k, y: self.y * k, z: self.z * k }
    }

    pub fn to_mat(&self) -> Mat {
        let (s, x, y, z) = (self.s, self.x, self.y, self.z);
        Mat {
            x: Cart::new(
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y + s * z),
                2.0 * (x * z - s * y),
            ),
            y: Cart::new(
                2.0 * (x * y - s * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z + s * x),
            ),
            z: Cart::new(
                2.0 * (x * z + s * y),
                2.0 * (y * z - s * x),
                1.0 - 2.0 * (x * x + y * y),
            ),
        }
    }

    pub fn to_rpy(&self) -> Rpy {
        self.to_mat().to_rpy()
    }

    pub fn to_zyz(&self) -> Zyz {
        self.to_mat().to_zyz()
    }

    pub fn to_zyx(&self) -> Zyx {
        self.to_mat().to_zyx()
    }

    /// True if the two quaternions describe the same rotation within epsilon.
    pub fn is_close(&self, other: &Quat) -> bool {
        // Canonical forms can still straddle s == 0; compare both signs.
        let same = is_tiny(self.s - other.s)
            && is_tiny(self.x - other.x)
            && is_tiny(self.y - other.y)
            && is_tiny(self.z - other.z);
        let flipped = is_tiny(self.s + other.s)
            && is_tiny(self.x + other.x)
            && is_tiny(self.y + other.y)
            && is_tiny(self.z + other.z);
        same || flipped
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ─── Rvec ───────────────────────────────────────────────────────────

impl Rvec {
    pub const ZERO: Rvec = Rvec { x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Rotation angle: the vector magnitude.
    #[inline]
    pub fn mag(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn to_quat(&self) -> Quat {
        let angle = self.mag();
        if angle < REAL_EPSILON {
            return Quat::IDENTITY;
        }
        let half = 0.5 * angle;
        let k = half.sin() / angle;
        let q = Quat { s: half.cos(), x: self.x * k, y: self.y * k, z: self.z * k };
        if q.s < 0.0 {
            Quat { s: -q.s, x: -q.x, y: -q.y, z: -q.z }
        } else {
            q
        }
    }

    pub fn to_mat(&self) -> Mat {
        self.to_quat().to_mat()
    }

    pub fn is_close(&self, other: &Rvec) -> bool {
        // Equivalent rotations can differ in representation near angle pi;
        // compare as quaternions.
        self.to_quat().is_close(&other.to_quat())
    }
}

// ─── Mat ────────────────────────────────────────────────────────────

impl Mat {
    pub const IDENTITY: Mat = Mat {
        x: Cart { x: 1.0, y: 0.0, z: 0.0 },
        y: Cart { x: 0.0, y: 1.0, z: 0.0 },
        z: Cart { x: 0.0, y: 0.0, z: 1.0 },
    };

    /// Element access by (row, col).
    #[inline]
    pub fn el(&self, row: usize, col: usize) -> f64 {
        let c = match col {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        };
        match row {
            0 => c.x,
            1 => c.y,
            _ => c.z,
        }
    }

    /// Matrix-vector product.
    pub fn mul_cart(&self, v: &Cart) -> Cart {
        self.x.scale(v.x).add(&self.y.scale(v.y)).add(&self.z.scale(v.z))
    }

    /// Matrix-matrix product.
    pub fn mul(&self, other: &Mat) -> Mat {
        Mat {
            x: self.mul_cart(&other.x),
            y: self.mul_cart(&other.y),
            z: self.mul_cart(&other.z),
        }
    }

    /// Inverse of a rotation matrix: the transpose.
    pub fn inv(&self) -> Mat {
        Mat {
            x: Cart::new(self.x.x, self.y.x, self.z.x),
            y: Cart::new(self.x.y, self.y.y, self.z.y),
            z: Cart::new(self.x.z, self.y.z, self.z.z),
        }
    }

    pub fn det(&self) -> f64 {
        self.x.dot(&self.y.cross(&self.z))
    }

    /// Columns orthonormal and determinant +1, within epsilon.
    pub fn is_norm(&self) -> bool {
        self.x.is_norm()
            && self.y.is_norm()
            && self.z.is_norm()
            && is_tiny(self.x.dot(&self.y))
            && is_tiny(self.y.dot(&self.z))
            && is_tiny(self.z.dot(&self.x))
            && is_tiny(self.det() - 1.0)
    }

    pub fn to_quat(&self) -> Quat {
        // Shepperd's method: pick the largest diagonal combination.
        let (m00, m11, m22) = (self.x.x, self.y.y, self.z.z);
        let tr = m00 + m11 + m22;
        let q = if tr > 0.0 {
            let s = (tr + 1.0).sqrt() * 2.0;
            Quat {
                s: 0.25 * s,
                x: (self.y.z - self.z.y) / s,
                y: (self.z.x - self.x.z) / s,
                z: (self.x.y - self.y.x) / s,
            }
        } else if m00 >= m11 && m00 >= m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Quat {
                s: (self.y.z - self.z.y) / s,
                x: 0.25 * s,
                y: (self.y.x + self.x.y) / s,
                z: (self.z.x + self.x.z) / s,
            }
        } else if m11 >= m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Quat {
                s: (self.z.x - self.x.z) / s,
                x: (self.y.x + self.x.y) / s,
                y: 0.25 * s,
                z: (self.z.y + self.y.z) / s,
            }
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Quat {
                s: (self.x.y - self.y.x) / s,
                x: (self.z.x + self.x.z) / s,
                y: (self.z.y + self.y.z) / s,
                z: 0.25 * s,
            }
        };
        // Renormalize to absorb drift from a nearly-orthonormal input.
        q.unit().unwrap_or(Quat::IDENTITY)
    }

    pub fn to_rvec(&self) -> Rvec {
        self.to_quat().to_rvec()
    }

    pub fn to_rpy(&self) -> Rpy {
        let sp = -self.x.z; // -r31
        let cp = (self.x.x * self.x.x + self.x.y * self.x.y).sqrt();
        if cp < REAL_EPSILON {
            // Pitch at +/- pi/2: roll and yaw are coupled; put it all in yaw.
            Rpy {
                r: 0.0,
                p: if sp > 0.0 { crate::scalar::PI_2 } else { -crate::scalar::PI_2 },
                y: (-self.y.x).atan2(self.y.y),
            }
        } else {
            Rpy {
                r: self.y.z.atan2(self.z.z),
                p: sp.atan2(cp),
                y: self.x.y.atan2(self.x.x),
            }
        }
    }

    pub fn to_zyx(&self) -> Zyx {
        let rpy = self.to_rpy();
        Zyx { z: rpy.y, y: rpy.p, x: rpy.r }
    }

    pub fn to_zyz(&self) -> Zyz {
        let sy = (self.z.x * self.z.x + self.z.y * self.z.y).sqrt();
        if sy < REAL_EPSILON {
            // Y rotation is 0 or pi; the two Z rotations merge.
            if self.z.z > 0.0 {
                Zyz { z: self.x.y.atan2(self.x.x), y: 0.0, zp: 0.0 }
            } else {
                Zyz { z: (-self.x.y).atan2(-self.x.x), y: crate::scalar::PI, zp: 0.0 }
            }
        } else {
            Zyz {
                z: self.z.y.atan2(self.z.x),
                y: cap_unity(self.z.z).acos(),
                zp: self.y.z.atan2(-self.x.z),
            }
        }
    }

    pub fn to_uxz(&self) -> Uxz {
        Uxz { x: self.x, z: self.z }
    }
}

impl Default for Mat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ─── Euler-like forms ───────────────────────────────────────────────

impl Rpy {
    pub fn to_mat(&self) -> Mat {
        let (sr, cr) = self.r.sin_cos();
        let (sp, cp) = self.p.sin_cos();
        let (sy, cy) = self.y.sin_cos();
        Mat {
            x: Cart::new(cy * cp, sy * cp, -sp),
            y: Cart::new(cy * sp * sr - sy * cr, sy * sp * sr + cy * cr, cp * sr),
            z: Cart::new(cy * sp * cr + sy * sr, sy * sp * cr - cy * sr, cp * cr),
        }
    }

    pub fn to_quat(&self) -> Quat {
        self.to_mat().to_quat()
    }

    pub fn to_rvec(&self) -> Rvec {
        self.to_quat().to_rvec()
    }

    /// Rotation angle in [0, pi].
    pub fn mag(&self) -> f64 {
        self.to_quat().mag()
    }
}

impl Zyx {
    pub fn to_mat(&self) -> Mat {
        Rpy { r: self.x, p: self.y, y: self.z }.to_mat()
    }

    pub fn to_rpy(&self) -> Rpy {
        Rpy { r: self.x, p: self.y, y: self.z }
    }

    pub fn to_quat(&self) -> Quat {
        self.to_mat().to_quat()
    }
}

impl Zyz {
    pub fn to_mat(&self) -> Mat {
        let (sz, cz) = self.z.sin_cos();
        let (sy, cy) = self.y.sin_cos();
        let (szp, czp) = self.zp.sin_cos();
        Mat {
            x: Cart::new(cz * cy * czp - sz * szp, sz * cy * czp + cz * szp, -sy * czp),
            y: Cart::new(-cz * cy * szp - sz * czp, -sz * cy * szp + cz * czp, sy * szp),
            z: Cart::new(cz * sy, sz * sy, cy),
        }
    }

    pub fn to_quat(&self) -> Quat {
        self.to_mat().to_quat()
    }

    pub fn to_zyx(&self) -> Zyx {
        self.to_mat().to_zyx()
    }
}

impl Uxz {
    /// Build the rotation matrix with X along `x` and Z along `z`,
    /// Gram-Schmidt orthogonalized. Degenerate inputs (zero vectors,
    /// parallel x and z) yield `DomainError`.
    pub fn to_mat(&self) -> GoResult<Mat> {
        let x = self.x.unit()?;
        let zproj = self.z.sub(&x.scale(self.z.dot(&x)));
        let z = zproj.unit().map_err(|_| GoError::DomainError)?;
        let y = z.cross(&x);
        Ok(Mat { x, y, z })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn random_quat(rng: &mut StdRng) -> Quat {
        loop {
            let q = Quat {
                s: rng.gen_range(-1.0..1.0),
                x: rng.gen_range(-1.0..1.0),
                y: rng.gen_range(-1.0..1.0),
                z: rng.gen_range(-1.0..1.0),
            };
            if let Ok(u) = q.unit() {
                return u;
            }
        }
    }

    #[test]
    fn identity_construction() {
        let q = Quat::IDENTITY;
        assert_eq!(q.s, 1.0);
        assert_eq!((q.x, q.y, q.z), (0.0, 0.0, 0.0));
        assert!(q.is_norm());
    }

    #[test]
    fn unit_zero_quat_is_norm_error() {
        let q = Quat { s: 0.0, x: 0.0, y: 0.0, z: 0.0 };
        assert_eq!(q.unit(), Err(GoError::NormError));
    }

    #[test]
    fn unit_canonicalizes_hemisphere() {
        let q = Quat { s: -2.0, x: 0.0, y: 2.0, z: 0.0 }.unit().unwrap();
        assert!(q.s >= 0.0);
        assert!(q.is_norm());
    }

    #[test]
    fn mult_output_is_canonical() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let a = random_quat(&mut rng);
            let b = random_quat(&mut rng);
            let c = a.mul(&b);
            assert!(c.s >= 0.0, "product left canonical hemisphere");
            assert!(c.is_norm());
        }
    }

    #[test]
    fn quat_inverse_annihilates() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let q = random_quat(&mut rng);
            let i = q.mul(&q.inv());
            assert!(i.is_close(&Quat::IDENTITY));
        }
    }

    #[test]
    fn rotation_grid_roundtrip() {
        // Conversion chain over a grid of rotation vectors in
        // [-pi/2, pi/2]^3: rvec -> mat -> quat -> zyz -> zyx -> rpy -> rvec.
        let start = -crate::scalar::PI_2;
        let end = crate::scalar::PI_2;
        let step = 0.35;
        let mut v = start;
        while v <= end {
            let mut w = start;
            while w <= end {
                let mut u = start;
                while u <= end {
                    let rvec = Rvec::new(u, v, w);
                    let mat = rvec.to_mat();
                    let quat = mat.to_quat();
                    let zyz = quat.to_zyz();
                    let zyx = zyz.to_zyx();
                    let rpy = zyx.to_rpy();
                    let back = rpy.to_rvec();
                    assert!(
                        rvec.is_close(&back),
                        "roundtrip failed for {rvec:?}, got {back:?}"
                    );
                    // Matrix from the uxz form must stay orthonormal.
                    let mout = mat.to_uxz().to_mat().unwrap();
                    assert!(mout.is_norm());
                    assert!(mout.to_rvec().is_close(&rvec));
                    u += step;
                }
                w += step;
            }
            v += step;
        }
    }

    #[test]
    fn random_quat_roundtrip() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..10_000 {
            let q = random_quat(&mut rng);
            assert!(q.to_mat().to_quat().is_close(&q));
            assert!(q.to_rvec().to_quat().is_close(&q));
            assert!(q.to_rpy().to_quat().is_close(&q));
            assert!(q.to_zyz().to_quat().is_close(&q));
            assert!(q.to_zyx().to_quat().is_close(&q));
        }
    }

    #[test]
    fn magnitudes_agree() {
        let mut rng = StdRng::seed_from_u64(31);
        for _ in 0..1000 {
            let q = random_quat(&mut rng);
            let angle = q.mag();
            assert!((0.0..=crate::scalar::PI + 1e-12).contains(&angle));
            assert!(is_tiny(q.to_rvec().mag() - angle));
            assert!((q.to_rpy().mag() - angle).abs() < 1e-6);
        }
    }

    #[test]
    fn rotate_matches_matrix() {
        let mut rng = StdRng::seed_from_u64(37);
        for _ in 0..1000 {
            let q = random_quat(&mut rng);
            let v = Cart::new(
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            );
            let qv = q.rotate(&v);
            let mv = q.to_mat().mul_cart(&v);
            assert!(qv.is_close(&mv));
        }
    }

    #[test]
    fn pow_splits_rotation() {
        let r = Rvec::new(0.3, -0.4, 0.5);
        let q = r.to_quat();
        let half = q.pow(0.5);
        assert!(half.mul(&half).is_close(&q));
        assert!(q.pow(0.0).is_close(&Quat::IDENTITY));
        assert!(q.pow(1.0).is_close(&q));
    }

    proptest::proptest! {
        #[test]
        fn prop_any_rvec_roundtrips(
            x in -1.5f64..1.5,
            y in -1.5f64..1.5,
            z in -1.5f64..1.5,
        ) {
            let rvec = Rvec::new(x, y, z);
            let back = rvec.to_quat().to_mat().to_zyz().to_mat().to_rvec();
            proptest::prop_assert!(rvec.is_close(&back));
        }
    }

    #[test]
    fn gimbal_pitch_is_handled() {
        let rpy = Rpy { r: 0.0, p: crate::scalar::PI_2, y: 0.3 };
        let back = rpy.to_mat().to_rpy().to_mat();
        assert!(back.to_quat().is_close(&rpy.to_quat()));
    }
}
