//! Symmetric eigensolving and the small SVD built on it.
//!
//! Householder reduction to tridiagonal form followed by QL iteration with
//! implicit shifts. This pair is the hot path for the 3x3 cases (point
//! cloud fitting, inertia principal axes); larger symmetric systems go
//! through the same code up to the matrix capacity.

use crate::matrix::{MATRIX_MAX, Matrix};
use crate::result::{GoError, GoResult};
use crate::scalar::REAL_EPSILON;

const QL_MAX_SWEEPS: usize = 30;

#[inline]
fn sign_like(a: f64, b: f64) -> f64 {
    if b >= 0.0 { a.abs() } else { -a.abs() }
}

/// Householder reduction of a real symmetric matrix to tridiagonal form.
///
/// On return `z` holds the accumulated orthogonal transform, `d` the
/// diagonal and `e` the subdiagonal (in `e[1..n]`).
fn tridiag_reduce(z: &mut Matrix, d: &mut [f64], e: &mut [f64]) {
    let n = z.rows;

    for i in (1..n).rev() {
        let l = i - 1;
        let mut h = 0.0;
        if l > 0 {
            let mut scale = 0.0;
            for k in 0..=l {
                scale += z.el[i][k].abs();
            }
            if scale == 0.0 {
                e[i] = z.el[i][l];
            } else {
                for k in 0..=l {
                    z.el[i][k] /= scale;
                    h += z.el[i][k] * z.el[i][k];
                }
                let f = z.el[i][l];
                let g = if f >= 0.0 { -h.sqrt() } else { h.sqrt() };
                e[i] = scale * g;
                h -= f * g;
                z.el[i][l] = f - g;
                let mut f_acc = 0.0;
                for j in 0..=l {
                    z.el[j][i] = z.el[i][j] / h;
                    let mut g_acc = 0.0;
                    for k in 0..=j {
                        g_acc += z.el[j][k] * z.el[i][k];
                    }
                    for k in (j + 1)..=l {
                        g_acc += z.el[k][j] * z.el[i][k];
                    }
                    e[j] = g_acc / h;
                    f_acc += e[j] * z.el[i][j];
                }
                let hh = f_acc / (h + h);
                for j in 0..=l {
                    let f = z.el[i][j];
                    let g = e[j] - hh * f;
                    e[j] = g;
                    for k in 0..=j {
                        z.el[j][k] -= f * e[k] + g * z.el[i][k];
                    }
                }
            }
        } else {
            e[i] = z.el[i][l];
        }
        d[i] = h;
    }

    d[0] = 0.0;
    e[0] = 0.0;

    // Accumulate the transformation matrix.
    for i in 0..n {
        if d[i] != 0.0 {
            for j in 0..i {
                let mut g = 0.0;
                for k in 0..i {
                    g += z.el[i][k] * z.el[k][j];
                }
                for k in 0..i {
                    z.el[k][j] -= g * z.el[k][i];
                }
            }
        }
        d[i] = z.el[i][i];
        z.el[i][i] = 1.0;
        for j in 0..i {
            z.el[j][i] = 0.0;
            z.el[i][j] = 0.0;
        }
    }
}

/// QL iteration with implicit shifts on a tridiagonal matrix, rotating the
/// eigenvector accumulator `z` along.
fn ql_implicit(d: &mut [f64], e: &mut [f64], z: &mut Matrix) -> GoResult<()> {
    let n = z.rows;

    for i in 1..n {
        e[i - 1] = e[i];
    }
    e[n - 1] = 0.0;

    for l in 0..n {
        let mut iter = 0;
        loop {
            let mut m = l;
            while m < n - 1 {
                let dd = d[m].abs() + d[m + 1].abs();
                if e[m].abs() <= f64::EPSILON * dd {
                    break;
                }
                m += 1;
            }
            if m == l {
                break;
            }
            iter += 1;
            if iter > QL_MAX_SWEEPS {
                return Err(GoError::Singular);
            }
            let mut g = (d[l + 1] - d[l]) / (2.0 * e[l]);
            let mut r = g.hypot(1.0);
            g = d[m] - d[l] + e[l] / (g + sign_like(r, g));
            let mut s = 1.0;
            let mut c = 1.0;
            let mut p = 0.0;
            let mut underflow = false;
            for i in (l..m).rev() {
                let mut f = s * e[i];
                let b = c * e[i];
                r = f.hypot(g);
                e[i + 1] = r;
                if r == 0.0 {
                    // Deflate without finishing the sweep.
                    d[i + 1] -= p;
                    e[m] = 0.0;
                    underflow = true;
                    break;
                }
                s = f / r;
                c = g / r;
                g = d[i + 1] - p;
                r = (d[i] - g) * s + 2.0 * c * b;
                p = s * r;
                d[i + 1] = g + p;
                g = c * r - b;
                for k in 0..n {
                    f = z.el[k][i + 1];
                    z.el[k][i + 1] = s * z.el[k][i] + c * f;
                    z.el[k][i] = c * z.el[k][i] - s * f;
                }
            }
            if !underflow {
                d[l] -= p;
                e[l] = g;
                e[m] = 0.0;
            }
        }
    }

    Ok(())
}

/// Eigenvalues and eigenvectors of a real symmetric matrix.
///
/// Returns `(values, vectors)` with `vectors.el[..][i]` the unit
/// eigenvector for `values[i]`. `BadArgs` if the matrix is not square or
/// not symmetric within epsilon, `Singular` if QL fails to converge.
pub fn sym_eigen(a: &Matrix) -> GoResult<([f64; MATRIX_MAX], Matrix)> {
    if a.rows != a.cols {
        return Err(GoError::BadArgs);
    }
    let n = a.rows;
    for i in 0..n {
        for j in (i + 1)..n {
            if (a.el[i][j] - a.el[j][i]).abs() > 1.0e-9 {
                return Err(GoError::BadArgs);
            }
        }
    }

    let mut z = *a;
    let mut d = [0.0; MATRIX_MAX];
    let mut e = [0.0; MATRIX_MAX];
    tridiag_reduce(&mut z, &mut d[..n], &mut e[..n]);
    ql_implicit(&mut d[..n], &mut e[..n], &mut z)?;

    Ok((d, z))
}

/// Convenience wrapper for the common 3x3 symmetric case.
pub fn sym3_eigen(a: &Matrix) -> GoResult<([f64; 3], Matrix)> {
    if a.rows != 3 || a.cols != 3 {
        return Err(GoError::BadArgs);
    }
    let (d, z) = sym_eigen(a)?;
    Ok(([d[0], d[1], d[2]], z))
}

/// Singular value decomposition of a 3x3 matrix: `A = U * diag(s) * V^T`,
/// singular values sorted descending.
///
/// Built from the symmetric eigendecomposition of `A^T A`. A rank-one (or
/// lower) input cannot fix the left frame and yields `Singular`.
pub fn svd3(a: &Matrix) -> GoResult<(Matrix, [f64; 3], Matrix)> {
    if a.rows != 3 || a.cols != 3 {
        return Err(GoError::BadArgs);
    }

    let ata = a.transpose().mul(a)?;
    let (vals, vecs) = sym3_eigen(&ata)?;

    // Sort eigenpairs by descending eigenvalue.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| vals[j].partial_cmp(&vals[i]).unwrap_or(std::cmp::Ordering::Equal));

    let mut v = Matrix::new(3, 3)?;
    let mut sigma = [0.0; 3];
    for (col, &src) in order.iter().enumerate() {
        sigma[col] = vals[src].max(0.0).sqrt();
        for row in 0..3 {
            v.el[row][col] = vecs.el[row][src];
        }
    }

    if sigma[1] < REAL_EPSILON {
        return Err(GoError::Singular);
    }

    // Left vectors: u_i = A v_i / sigma_i, completing a right-handed frame
    // when the smallest singular value is numerically zero.
    let mut u = Matrix::new(3, 3)?;
    for col in 0..3 {
        if sigma[col] > REAL_EPSILON {
            let mut av = [0.0; 3];
            let vcol = [v.el[0][col], v.el[1][col], v.el[2][col]];
            a.mul_vec(&vcol, &mut av)?;
            for row in 0..3 {
                u.el[row][col] = av[row] / sigma[col];
            }
        } else {
            // col == 2 here since sigma[1] was checked above.
            u.el[0][2] = u.el[1][0] * u.el[2][1] - u.el[2][0] * u.el[1][1];
            u.el[1][2] = u.el[2][0] * u.el[0][1] - u.el[0][0] * u.el[2][1];
            u.el[2][2] = u.el[0][0] * u.el[1][1] - u.el[1][0] * u.el[0][1];
        }
    }

    Ok((u, sigma, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn random_symmetric(rng: &mut StdRng, n: usize) -> Matrix {
        let mut m = Matrix::new(n, n).unwrap();
        for i in 0..n {
            for j in i..n {
                let v = rng.gen_range(-1.0..1.0);
                m.el[i][j] = v;
                m.el[j][i] = v;
            }
        }
        m
    }

    #[test]
    fn eigenpairs_satisfy_definition() {
        let mut rng = StdRng::seed_from_u64(71);
        for &n in &[3usize, 4, 6, 8] {
            for _ in 0..50 {
                let a = random_symmetric(&mut rng, n);
                let (vals, vecs) = sym_eigen(&a).unwrap();
                for i in 0..n {
                    let v: Vec<f64> = (0..n).map(|r| vecs.el[r][i]).collect();
                    let mut av = [0.0; MATRIX_MAX];
                    a.mul_vec(&v, &mut av).unwrap();
                    for r in 0..n {
                        assert!(
                            (av[r] - vals[i] * v[r]).abs() < 1e-8,
                            "A v != lambda v at n={n} pair {i} row {r}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn eigenvectors_are_orthonormal() {
        let mut rng = StdRng::seed_from_u64(73);
        let a = random_symmetric(&mut rng, 6);
        let (_, vecs) = sym_eigen(&a).unwrap();
        let vtv = vecs.transpose().mul(&vecs).unwrap();
        for i in 0..6 {
            for j in 0..6 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!((vtv.el[i][j] - expect).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn asymmetric_input_rejected() {
        let mut a = Matrix::identity(3).unwrap();
        a.el[0][1] = 0.5;
        assert_eq!(sym_eigen(&a).unwrap_err(), GoError::BadArgs);
    }

    #[test]
    fn svd_reconstructs_input() {
        let mut rng = StdRng::seed_from_u64(79);
        for _ in 0..200 {
            let mut a = Matrix::new(3, 3).unwrap();
            for i in 0..3 {
                for j in 0..3 {
                    a.el[i][j] = rng.gen_range(-2.0..2.0);
                }
            }
            let (u, s, v) = svd3(&a).unwrap();
            let mut us = u;
            for col in 0..3 {
                for row in 0..3 {
                    us.el[row][col] *= s[col];
                }
            }
            let back = us.mul(&v.transpose()).unwrap();
            for i in 0..3 {
                for j in 0..3 {
                    assert!((back.el[i][j] - a.el[i][j]).abs() < 1e-8);
                }
            }
            assert!(s[0] >= s[1] && s[1] >= s[2]);
        }
    }

    #[test]
    fn svd_rank_one_is_singular() {
        let mut a = Matrix::new(3, 3).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                a.el[i][j] = ((i + 1) * (j + 1)) as f64;
            }
        }
        assert_eq!(svd3(&a).unwrap_err(), GoError::Singular);
    }
}
