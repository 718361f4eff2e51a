//! Cartesian vectors and their spherical/cylindrical forms.

use serde::{Deserialize, Serialize};

use crate::result::{GoError, GoResult};
use crate::scalar::{REAL_EPSILON, TRAN_FUZZ, is_tiny};

/// A 3D Cartesian vector or point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Cart {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Spherical form: `theta` about Z from X, `phi` down from Z, radius `r`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sph {
    pub theta: f64,
    pub phi: f64,
    pub r: f64,
}

/// Cylindrical form: `theta` about Z from X, radius `r`, height `z`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cyl {
    pub theta: f64,
    pub r: f64,
    pub z: f64,
}

impl Cart {
    pub const ZERO: Cart = Cart { x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(&self, other: &Cart) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(&self, other: &Cart) -> Cart {
        Cart {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    #[inline]
    pub fn mag(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Squared magnitude, when the caller only compares lengths.
    #[inline]
    pub fn mag_sq(&self) -> f64 {
        self.dot(self)
    }

    /// Unit vector in the same direction.
    ///
    /// A zero vector has no direction and yields `DomainError`.
    pub fn unit(&self) -> GoResult<Cart> {
        let m = self.mag();
        if m < REAL_EPSILON {
            return Err(GoError::DomainError);
        }
        Ok(self.scale(1.0 / m))
    }

    #[inline]
    pub fn scale(&self, s: f64) -> Cart {
        Cart { x: self.x * s, y: self.y * s, z: self.z * s }
    }

    #[inline]
    pub fn neg(&self) -> Cart {
        self.scale(-1.0)
    }

    #[inline]
    pub fn add(&self, other: &Cart) -> Cart {
        Cart { x: self.x + other.x, y: self.y + other.y, z: self.z + other.z }
    }

    #[inline]
    pub fn sub(&self, other: &Cart) -> Cart {
        Cart { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
    }

    /// True if all components match within the translational fuzz.
    #[inline]
    pub fn is_close(&self, other: &Cart) -> bool {
        self.sub(other).mag() < TRAN_FUZZ
    }

    /// True if this is a unit vector within epsilon.
    #[inline]
    pub fn is_norm(&self) -> bool {
        is_tiny(self.mag() - 1.0)
    }

    /// The projection of `self` onto `onto`.
    ///
    /// Fails with `DomainError` if `onto` is zero.
    pub fn project(&self, onto: &Cart) -> GoResult<Cart> {
        let d = onto.mag_sq();
        if d < REAL_EPSILON {
            return Err(GoError::DomainError);
        }
        Ok(onto.scale(self.dot(onto) / d))
    }

    /// Convert to spherical form.
    pub fn to_sph(&self) -> Sph {
        let r = self.mag();
        Sph {
            theta: self.y.atan2(self.x),
            phi: if r < REAL_EPSILON { 0.0 } else { (self.z / r).clamp(-1.0, 1.0).acos() },
            r,
        }
    }

    /// Convert to cylindrical form.
    pub fn to_cyl(&self) -> Cyl {
        Cyl {
            theta: self.y.atan2(self.x),
            r: (self.x * self.x + self.y * self.y).sqrt(),
            z: self.z,
        }
    }
}

impl Sph {
    pub fn to_cart(&self) -> Cart {
        let sp = self.phi.sin();
        Cart {
            x: self.r * sp * self.theta.cos(),
            y: self.r * sp * self.theta.sin(),
            z: self.r * self.phi.cos(),
        }
    }
}

impl Cyl {
    pub fn to_cart(&self) -> Cart {
        Cart {
            x: self.r * self.theta.cos(),
            y: self.r * self.theta.sin(),
            z: self.z,
        }
    }
}

impl std::ops::Add for Cart {
    type Output = Cart;
    fn add(self, rhs: Cart) -> Cart {
        Cart::add(&self, &rhs)
    }
}

impl std::ops::Sub for Cart {
    type Output = Cart;
    fn sub(self, rhs: Cart) -> Cart {
        Cart::sub(&self, &rhs)
    }
}

impl std::ops::Mul<f64> for Cart {
    type Output = Cart;
    fn mul(self, rhs: f64) -> Cart {
        self.scale(rhs)
    }
}

impl std::ops::Neg for Cart {
    type Output = Cart;
    fn neg(self) -> Cart {
        self.scale(-1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn dot_cross_orthogonality() {
        let a = Cart::new(1.0, 2.0, 3.0);
        let b = Cart::new(-4.0, 5.0, 0.5);
        let c = a.cross(&b);
        assert_abs_diff_eq!(c.dot(&a), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.dot(&b), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn unit_zero_vector_is_domain_error() {
        assert_eq!(Cart::ZERO.unit(), Err(GoError::DomainError));
        let u = Cart::new(3.0, 0.0, 4.0).unit().unwrap();
        assert!(u.is_norm());
        assert_abs_diff_eq!(u.x, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(u.z, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn sph_roundtrip() {
        let c = Cart::new(1.0, 2.0, -3.0);
        let back = c.to_sph().to_cart();
        assert!(c.is_close(&back));
    }

    #[test]
    fn cyl_roundtrip() {
        let c = Cart::new(1.0, 2.0, -3.0);
        let back = c.to_cyl().to_cart();
        assert!(c.is_close(&back));
    }

    #[test]
    fn projection_lies_along_axis() {
        let v = Cart::new(1.0, 1.0, 0.0);
        let p = v.project(&Cart::new(2.0, 0.0, 0.0)).unwrap();
        assert!(p.is_close(&Cart::new(1.0, 0.0, 0.0)));
        assert_eq!(v.project(&Cart::ZERO), Err(GoError::DomainError));
    }
}
