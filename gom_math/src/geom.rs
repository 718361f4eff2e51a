//! Kinematics-helper geometry: lines, planes, trilateration and rigid
//! point-cloud alignment.

use crate::cart::Cart;
use crate::eigen::svd3;
use crate::matrix::Matrix;
use crate::pose::Pose;
use crate::result::{GoError, GoResult};
use crate::rot::Mat;
use crate::scalar::REAL_EPSILON;

/// A line through `point` with unit `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub point: Cart,
    pub direction: Cart,
}

/// A plane with unit `normal` satisfying `normal . p + d == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Cart,
    pub d: f64,
}

impl Line {
    /// Line through a point along a direction; the direction is
    /// normalized on construction.
    pub fn from_point_direction(point: &Cart, direction: &Cart) -> GoResult<Line> {
        Ok(Line { point: *point, direction: direction.unit()? })
    }

    /// Line through two distinct points.
    pub fn from_points(a: &Cart, b: &Cart) -> GoResult<Line> {
        Line::from_point_direction(a, &b.sub(a))
    }

    /// The point at parameter `t` along the line.
    #[inline]
    pub fn eval(&self, t: f64) -> Cart {
        self.point.add(&self.direction.scale(t))
    }

    /// Perpendicular projection of a point onto the line.
    pub fn project(&self, p: &Cart) -> Cart {
        let t = p.sub(&self.point).dot(&self.direction);
        self.eval(t)
    }

    /// Perpendicular distance from a point.
    pub fn distance(&self, p: &Cart) -> f64 {
        p.sub(&self.project(p)).mag()
    }
}

impl Plane {
    /// Plane from a unit normal and a point on it.
    pub fn from_point_normal(point: &Cart, normal: &Cart) -> GoResult<Plane> {
        let n = normal.unit()?;
        Ok(Plane { normal: n, d: -n.dot(point) })
    }

    /// Plane through three non-colinear points.
    pub fn from_points(a: &Cart, b: &Cart, c: &Cart) -> GoResult<Plane> {
        let n = b.sub(a).cross(&c.sub(a));
        if n.mag() < REAL_EPSILON {
            return Err(GoError::Singular);
        }
        Plane::from_point_normal(a, &n)
    }

    /// Signed distance of a point from the plane, along the normal.
    #[inline]
    pub fn distance(&self, p: &Cart) -> f64 {
        self.normal.dot(p) + self.d
    }

    /// Projection of a point onto the plane.
    pub fn project(&self, p: &Cart) -> Cart {
        p.sub(&self.normal.scale(self.distance(p)))
    }

    /// Intersection of a line with the plane. A line parallel to the
    /// plane (within epsilon) has no single intersection.
    pub fn intersect_line(&self, line: &Line) -> GoResult<Cart> {
        let denom = self.normal.dot(&line.direction);
        if denom.abs() < REAL_EPSILON {
            return Err(GoError::Singular);
        }
        let t = -self.distance(&line.point) / denom;
        Ok(line.eval(t))
    }
}

/// Least-squares rigid transform mapping point cloud `a` onto `b`,
/// Kabsch-style via the SVD of the outer-product sum.
///
/// Needs at least three points and full geometric rank; degenerate clouds
/// (colinear, coincident) report `Singular`.
pub fn cart_cart_pose(a: &[Cart], b: &[Cart]) -> GoResult<Pose> {
    if a.len() != b.len() || a.len() < 3 {
        return Err(GoError::BadArgs);
    }
    let inv_n = 1.0 / a.len() as f64;

    let mut ca = Cart::ZERO;
    let mut cb = Cart::ZERO;
    for (pa, pb) in a.iter().zip(b) {
        ca = ca.add(pa);
        cb = cb.add(pb);
    }
    ca = ca.scale(inv_n);
    cb = cb.scale(inv_n);

    // Outer-product sum H = sum (a_i - ca)(b_i - cb)^T.
    let mut h = Matrix::new(3, 3)?;
    for (pa, pb) in a.iter().zip(b) {
        let da = pa.sub(&ca);
        let db = pb.sub(&cb);
        let dav = [da.x, da.y, da.z];
        let dbv = [db.x, db.y, db.z];
        for i in 0..3 {
            for j in 0..3 {
                h.el[i][j] += dav[i] * dbv[j];
            }
        }
    }

    let (u, _sigma, v) = svd3(&h)?;

    // R = V D U^T with D correcting a reflection.
    let vut = v.mul(&u.transpose())?;
    let det = vut.el[0][0] * (vut.el[1][1] * vut.el[2][2] - vut.el[1][2] * vut.el[2][1])
        - vut.el[0][1] * (vut.el[1][0] * vut.el[2][2] - vut.el[1][2] * vut.el[2][0])
        + vut.el[0][2] * (vut.el[1][0] * vut.el[2][1] - vut.el[1][1] * vut.el[2][0]);
    let mut vd = v;
    if det < 0.0 {
        for row in 0..3 {
            vd.el[row][2] = -vd.el[row][2];
        }
    }
    let r = vd.mul(&u.transpose())?;

    let rot = Mat {
        x: Cart::new(r.el[0][0], r.el[1][0], r.el[2][0]),
        y: Cart::new(r.el[0][1], r.el[1][1], r.el[2][1]),
        z: Cart::new(r.el[0][2], r.el[1][2], r.el[2][2]),
    }
    .to_quat();

    let tran = cb.sub(&rot.rotate(&ca));
    Ok(Pose { tran, rot })
}

/// The two points at the given distances from three anchor points.
///
/// Colinear anchors leave the solution circle undetermined and report
/// `Singular`; a slightly negative discriminant from measurement noise is
/// clamped to the anchor plane.
pub fn cart_trilaterate(
    c1: &Cart,
    c2: &Cart,
    c3: &Cart,
    r1: f64,
    r2: f64,
    r3: f64,
) -> GoResult<(Cart, Cart)> {
    let e12 = c2.sub(c1);
    let d = e12.mag();
    if d < REAL_EPSILON {
        return Err(GoError::Singular);
    }
    let ex = e12.scale(1.0 / d);

    let e13 = c3.sub(c1);
    let i = ex.dot(&e13);
    let ey_raw = e13.sub(&ex.scale(i));
    if ey_raw.mag() < REAL_EPSILON {
        // All three anchors on one line.
        return Err(GoError::Singular);
    }
    let ey = ey_raw.unit()?;
    let ez = ex.cross(&ey);
    let j = ey.dot(&e13);

    let x = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let y = (r1 * r1 - r3 * r3 + i * i + j * j - 2.0 * i * x) / (2.0 * j);
    let zsq = r1 * r1 - x * x - y * y;
    let z = if zsq > 0.0 { zsq.sqrt() } else { 0.0 };

    let base = c1.add(&ex.scale(x)).add(&ey.scale(y));
    Ok((base.add(&ez.scale(z)), base.sub(&ez.scale(z))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rot::Rvec;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn line_projection_is_perpendicular() {
        let line = Line::from_points(&Cart::ZERO, &Cart::new(1.0, 1.0, 0.0)).unwrap();
        let p = Cart::new(1.0, 0.0, 0.0);
        let proj = line.project(&p);
        assert!(p.sub(&proj).dot(&line.direction).abs() < 1e-12);
        assert!((line.distance(&p) - (0.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn plane_construction_normalizes() {
        let plane =
            Plane::from_point_normal(&Cart::new(0.0, 0.0, 2.0), &Cart::new(0.0, 0.0, 5.0)).unwrap();
        assert!(plane.normal.is_norm());
        assert!((plane.distance(&Cart::new(3.0, 4.0, 2.0))).abs() < 1e-12);
        assert!((plane.distance(&Cart::new(0.0, 0.0, 3.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_plane_points_singular() {
        let a = Cart::ZERO;
        let b = Cart::new(1.0, 0.0, 0.0);
        let c = Cart::new(2.0, 0.0, 0.0);
        assert_eq!(Plane::from_points(&a, &b, &c).unwrap_err(), GoError::Singular);
    }

    #[test]
    fn line_plane_intersection() {
        let plane =
            Plane::from_point_normal(&Cart::new(0.0, 0.0, 1.0), &Cart::new(0.0, 0.0, 1.0)).unwrap();
        let line =
            Line::from_point_direction(&Cart::ZERO, &Cart::new(1.0, 0.0, 1.0)).unwrap();
        let hit = plane.intersect_line(&line).unwrap();
        assert!(hit.is_close(&Cart::new(1.0, 0.0, 1.0)));

        let parallel = Line::from_point_direction(&Cart::ZERO, &Cart::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(plane.intersect_line(&parallel).unwrap_err(), GoError::Singular);
    }

    #[test]
    fn point_cloud_fit_recovers_pose() {
        let mut rng = StdRng::seed_from_u64(83);
        for _ in 0..200 {
            let truth = Pose::new(
                Cart::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                ),
                Rvec::new(
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                    rng.gen_range(-2.0..2.0),
                )
                .to_quat(),
            );
            let cloud: Vec<Cart> = (0..8)
                .map(|_| {
                    Cart::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    )
                })
                .collect();
            let moved: Vec<Cart> = cloud.iter().map(|p| truth.apply(p)).collect();
            let fit = cart_cart_pose(&cloud, &moved).unwrap();
            assert!(fit.tran.is_close(&truth.tran));
            assert!(fit.rot.is_close(&truth.rot));
        }
    }

    #[test]
    fn trilateration_finds_the_point() {
        let mut rng = StdRng::seed_from_u64(89);
        let c1 = Cart::new(0.0, 0.0, 0.0);
        let c2 = Cart::new(4.0, 0.0, 0.0);
        let c3 = Cart::new(1.0, 3.0, 0.0);
        for _ in 0..1000 {
            let truth = Cart::new(
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
            );
            let (p1, p2) = cart_trilaterate(
                &c1,
                &c2,
                &c3,
                truth.sub(&c1).mag(),
                truth.sub(&c2).mag(),
                truth.sub(&c3).mag(),
            )
            .unwrap();
            assert!(
                p1.is_close(&truth) || p2.is_close(&truth),
                "neither candidate matched {truth:?}"
            );
        }
    }

    #[test]
    fn trilateration_colinear_is_singular() {
        let c1 = Cart::new(0.0, 0.0, 0.0);
        let c2 = Cart::new(1.0, 1.0, 1.0);
        let c3 = Cart::new(2.0, 2.0, 2.0);
        assert_eq!(
            cart_trilaterate(&c1, &c2, &c3, 1.0, 1.0, 1.0).unwrap_err(),
            GoError::Singular
        );
    }
}
