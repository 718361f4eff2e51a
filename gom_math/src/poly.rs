//! Closed-form polynomial root finders up to quartics.
//!
//! All roots come back as [`Complex`] pairs/triples/quadruples; real roots
//! simply have a vanishing imaginary part. A vanishing leading coefficient
//! is reported as `DivError` rather than silently degrading the degree.

use crate::result::{GoError, GoResult};
use crate::scalar::REAL_EPSILON;

/// A complex number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

/// `a x^2 + b x + c`
#[derive(Debug, Clone, Copy, Default)]
pub struct Quadratic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// `a x^3 + b x^2 + c x + d`
#[derive(Debug, Clone, Copy, Default)]
pub struct Cubic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// `a x^4 + b x^3 + c x^2 + d x + e`
#[derive(Debug, Clone, Copy, Default)]
pub struct Quartic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    #[inline]
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    #[inline]
    pub fn add(&self, o: &Complex) -> Complex {
        Complex::new(self.re + o.re, self.im + o.im)
    }

    #[inline]
    pub fn sub(&self, o: &Complex) -> Complex {
        Complex::new(self.re - o.re, self.im - o.im)
    }

    #[inline]
    pub fn mul(&self, o: &Complex) -> Complex {
        Complex::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    pub fn div(&self, o: &Complex) -> GoResult<Complex> {
        let den = o.re * o.re + o.im * o.im;
        if den < REAL_EPSILON * REAL_EPSILON {
            return Err(GoError::DivideByZero);
        }
        Ok(Complex::new(
            (self.re * o.re + self.im * o.im) / den,
            (self.im * o.re - self.re * o.im) / den,
        ))
    }

    #[inline]
    pub fn scale(&self, s: f64) -> Complex {
        Complex::new(self.re * s, self.im * s)
    }

    #[inline]
    pub fn mag(&self) -> f64 {
        self.re.hypot(self.im)
    }

    /// Principal square root.
    pub fn sqrt(&self) -> Complex {
        let m = self.mag();
        let re = ((m + self.re) * 0.5).max(0.0).sqrt();
        let im_mag = ((m - self.re) * 0.5).max(0.0).sqrt();
        Complex::new(re, if self.im >= 0.0 { im_mag } else { -im_mag })
    }

    /// Principal cube root.
    pub fn cbrt(&self) -> Complex {
        let m = self.mag();
        if m < f64::MIN_POSITIVE {
            return Complex::ZERO;
        }
        let r = m.cbrt();
        let theta = self.im.atan2(self.re) / 3.0;
        Complex::new(r * theta.cos(), r * theta.sin())
    }
}

impl Quadratic {
    /// Both complex roots.
    pub fn roots(&self) -> GoResult<[Complex; 2]> {
        if self.a.abs() < REAL_EPSILON {
            return Err(GoError::DivError);
        }
        let disc = self.b * self.b - 4.0 * self.a * self.c;
        let two_a = 2.0 * self.a;
        if disc >= 0.0 {
            // Avoid cancellation: compute the larger-magnitude root first.
            let sq = disc.sqrt();
            let q = -0.5 * (self.b + self.b.signum() * sq);
            let r1 = if q.abs() > f64::MIN_POSITIVE { q / self.a } else { -self.b / two_a };
            let r2 = if q.abs() > f64::MIN_POSITIVE { self.c / q } else { -self.b / two_a };
            Ok([Complex::new(r1, 0.0), Complex::new(r2, 0.0)])
        } else {
            let re = -self.b / two_a;
            let im = (-disc).sqrt() / two_a;
            Ok([Complex::new(re, im), Complex::new(re, -im)])
        }
    }

    pub fn eval(&self, x: &Complex) -> Complex {
        x.mul(x).scale(self.a).add(&x.scale(self.b)).add(&Complex::new(self.c, 0.0))
    }
}

/// Roots of a monic quadratic with complex coefficients:
/// `x^2 + b x + c`.
fn monic_quadratic_roots(b: Complex, c: Complex) -> [Complex; 2] {
    let disc = b.mul(&b).sub(&c.scale(4.0));
    let sq = disc.sqrt();
    let r1 = b.add(&sq).scale(-0.5);
    let r2 = b.sub(&sq).scale(-0.5);
    [r1, r2]
}

impl Cubic {
    /// All three complex roots, via Cardano on the depressed cubic.
    pub fn roots(&self) -> GoResult<[Complex; 3]> {
        if self.a.abs() < REAL_EPSILON {
            return Err(GoError::DivError);
        }
        let b = self.b / self.a;
        let c = self.c / self.a;
        let d = self.d / self.a;

        // t = x + b/3: t^3 + p t + q
        let shift = b / 3.0;
        let p = c - b * b / 3.0;
        let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;

        let half_q = Complex::new(-q / 2.0, 0.0);
        let disc = Complex::new(q * q / 4.0 + p * p * p / 27.0, 0.0);
        let sq = disc.sqrt();

        // Pick the branch of u that keeps |u| away from zero.
        let u_plus = half_q.add(&sq).cbrt();
        let u_minus = half_q.sub(&sq).cbrt();
        let u = if u_plus.mag() >= u_minus.mag() { u_plus } else { u_minus };

        let mut roots = [Complex::ZERO; 3];
        if u.mag() < REAL_EPSILON {
            // p == q == 0: triple root at the shift.
            for r in roots.iter_mut() {
                *r = Complex::new(-shift, 0.0);
            }
            return Ok(roots);
        }

        let v = Complex::new(-p / 3.0, 0.0).div(&u)?;

        // The three cube roots of unity.
        const HALF_SQRT3: f64 = 0.866_025_403_784_438_6;
        let omega = [
            Complex::new(1.0, 0.0),
            Complex::new(-0.5, HALF_SQRT3),
            Complex::new(-0.5, -HALF_SQRT3),
        ];
        let omega_bar = [
            Complex::new(1.0, 0.0),
            Complex::new(-0.5, -HALF_SQRT3),
            Complex::new(-0.5, HALF_SQRT3),
        ];

        for k in 0..3 {
            let t = omega[k].mul(&u).add(&omega_bar[k].mul(&v));
            roots[k] = Complex::new(t.re - shift, t.im);
        }
        Ok(roots)
    }

    pub fn eval(&self, x: &Complex) -> Complex {
        // Horner in complex arithmetic.
        let mut acc = Complex::new(self.a, 0.0);
        for coeff in [self.b, self.c, self.d] {
            acc = acc.mul(x).add(&Complex::new(coeff, 0.0));
        }
        acc
    }
}

impl Quartic {
    /// All four complex roots, via Ferrari's resolvent-cubic method.
    pub fn roots(&self) -> GoResult<[Complex; 4]> {
        if self.a.abs() < REAL_EPSILON {
            return Err(GoError::DivError);
        }
        let b = self.b / self.a;
        let c = self.c / self.a;
        let d = self.d / self.a;
        let e = self.e / self.a;

        // y = x + b/4: y^4 + p y^2 + q y + r
        let shift = b / 4.0;
        let b2 = b * b;
        let p = c - 3.0 * b2 / 8.0;
        let q = d - b * c / 2.0 + b2 * b / 8.0;
        let r = e - b * d / 4.0 + b2 * c / 16.0 - 3.0 * b2 * b2 / 256.0;

        let ys: [Complex; 4];
        if q.abs() < REAL_EPSILON {
            // Biquadratic: z^2 + p z + r with y = +/- sqrt(z).
            let zs = monic_quadratic_roots(Complex::new(p, 0.0), Complex::new(r, 0.0));
            let s0 = zs[0].sqrt();
            let s1 = zs[1].sqrt();
            ys = [s0, s0.scale(-1.0), s1, s1.scale(-1.0)];
        } else {
            // Resolvent: 8 m^3 + 8 p m^2 + (2 p^2 - 8 r) m - q^2 = 0.
            let res = Cubic {
                a: 8.0,
                b: 8.0 * p,
                c: 2.0 * p * p - 8.0 * r,
                d: -q * q,
            };
            let mroots = res.roots()?;
            // Any root works algebraically; the most-real, largest one is
            // numerically safest since we divide by sqrt(2m).
            let mut m = mroots[0];
            for cand in &mroots[1..] {
                let better = (cand.im.abs(), -cand.mag()) < (m.im.abs(), -m.mag());
                if better {
                    m = *cand;
                }
            }
            let s = m.scale(2.0).sqrt();
            if s.mag() < REAL_EPSILON {
                return Err(GoError::ArithmeticError);
            }
            let q_over_2s = Complex::new(q, 0.0).div(&s.scale(2.0))?;
            let half_p_plus_m = m.add(&Complex::new(p / 2.0, 0.0));

            // (y^2 + s y + p/2 + m - q/2s)(y^2 - s y + p/2 + m + q/2s)
            let r1 = monic_quadratic_roots(s, half_p_plus_m.sub(&q_over_2s));
            let r2 = monic_quadratic_roots(s.scale(-1.0), half_p_plus_m.add(&q_over_2s));
            ys = [r1[0], r1[1], r2[0], r2[1]];
        }

        let mut roots = [Complex::ZERO; 4];
        for (out, y) in roots.iter_mut().zip(ys.iter()) {
            *out = Complex::new(y.re - shift, y.im);
        }
        Ok(roots)
    }

    pub fn eval(&self, x: &Complex) -> Complex {
        let mut acc = Complex::new(self.a, 0.0);
        for coeff in [self.b, self.c, self.d, self.e] {
            acc = acc.mul(x).add(&Complex::new(coeff, 0.0));
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Residual tolerance scaling with coefficient magnitude.
    fn tol(coeffs: &[f64]) -> f64 {
        let m = coeffs.iter().fold(1.0f64, |acc, c| acc.max(c.abs()));
        1.0e-6 * m
    }

    #[test]
    fn quadratic_known_roots() {
        // (x - 2)(x + 3) = x^2 + x - 6
        let q = Quadratic { a: 1.0, b: 1.0, c: -6.0 };
        let roots = q.roots().unwrap();
        let mut vals: Vec<f64> = roots.iter().map(|r| r.re).collect();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((vals[0] + 3.0).abs() < 1e-10);
        assert!((vals[1] - 2.0).abs() < 1e-10);
        assert!(roots.iter().all(|r| r.im == 0.0));
    }

    #[test]
    fn quadratic_complex_pair() {
        // x^2 + 1
        let q = Quadratic { a: 1.0, b: 0.0, c: 1.0 };
        let roots = q.roots().unwrap();
        for r in &roots {
            assert!(r.re.abs() < 1e-12);
            assert!((r.im.abs() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn degenerate_leading_coefficient() {
        assert_eq!(
            Quadratic { a: 0.0, b: 1.0, c: 1.0 }.roots().unwrap_err(),
            GoError::DivError
        );
        assert_eq!(
            Cubic { a: 0.0, ..Default::default() }.roots().unwrap_err(),
            GoError::DivError
        );
        assert_eq!(
            Quartic { a: 0.0, ..Default::default() }.roots().unwrap_err(),
            GoError::DivError
        );
    }

    #[test]
    fn random_integer_quadratics() {
        let mut rng = StdRng::seed_from_u64(97);
        for _ in 0..2000 {
            let q = Quadratic {
                a: rng.gen_range(-10i32..=10) as f64,
                b: rng.gen_range(-10i32..=10) as f64,
                c: rng.gen_range(-10i32..=10) as f64,
            };
            if q.a.abs() < 0.5 {
                continue;
            }
            let t = tol(&[q.a, q.b, q.c]);
            for r in q.roots().unwrap() {
                assert!(q.eval(&r).mag() < t, "residual too large for {q:?} at {r:?}");
            }
        }
    }

    #[test]
    fn random_integer_cubics() {
        let mut rng = StdRng::seed_from_u64(101);
        for _ in 0..2000 {
            let c = Cubic {
                a: rng.gen_range(-10i32..=10) as f64,
                b: rng.gen_range(-10i32..=10) as f64,
                c: rng.gen_range(-10i32..=10) as f64,
                d: rng.gen_range(-10i32..=10) as f64,
            };
            if c.a.abs() < 0.5 {
                continue;
            }
            let t = tol(&[c.a, c.b, c.c, c.d]);
            for r in c.roots().unwrap() {
                assert!(c.eval(&r).mag() < t, "residual too large for {c:?} at {r:?}");
            }
        }
    }

    #[test]
    fn random_integer_quartics() {
        let mut rng = StdRng::seed_from_u64(103);
        for _ in 0..2000 {
            let q = Quartic {
                a: rng.gen_range(-10i32..=10) as f64,
                b: rng.gen_range(-10i32..=10) as f64,
                c: rng.gen_range(-10i32..=10) as f64,
                d: rng.gen_range(-10i32..=10) as f64,
                e: rng.gen_range(-10i32..=10) as f64,
            };
            if q.a.abs() < 0.5 {
                continue;
            }
            let t = tol(&[q.a, q.b, q.c, q.d, q.e]);
            for r in q.roots().unwrap() {
                assert!(q.eval(&r).mag() < t, "residual too large for {q:?} at {r:?}");
            }
        }
    }

    #[test]
    fn cubic_triple_root() {
        // (x - 1)^3 = x^3 - 3x^2 + 3x - 1
        let c = Cubic { a: 1.0, b: -3.0, c: 3.0, d: -1.0 };
        for r in c.roots().unwrap() {
            assert!((r.re - 1.0).abs() < 1e-4);
            assert!(r.im.abs() < 1e-4);
        }
    }

    #[test]
    fn biquadratic_quartic() {
        // x^4 - 5x^2 + 4 = (x^2-1)(x^2-4)
        let q = Quartic { a: 1.0, b: 0.0, c: -5.0, d: 0.0, e: 4.0 };
        let mut vals: Vec<f64> = q.roots().unwrap().iter().map(|r| r.re).collect();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let expect = [-2.0, -1.0, 1.0, 2.0];
        for (v, e) in vals.iter().zip(expect.iter()) {
            assert!((v - e).abs() < 1e-8);
        }
    }
}
