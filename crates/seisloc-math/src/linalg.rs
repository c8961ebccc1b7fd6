//! Linear algebra utilities.
//!
//! Golub-Reinsch SVD, cyclic Jacobi eigendecomposition of symmetric
//! matrices, and the closed-form 2x2 eigensystem used for error ellipses.

use ndarray::{Array1, Array2};

/// Implicit-QR sweeps allowed per singular value.
const MAX_QR_SWEEPS: usize = 75;

/// Jacobi sweeps allowed for the symmetric eigensolver.
const MAX_JACOBI_SWEEPS: usize = 100;

/// Thin singular value decomposition `A = U · diag(sv) · Vᵗ`.
#[derive(Debug, Clone)]
pub struct Svd {
    /// rows × k
    pub u: Array2<f64>,
    /// k, non-increasing
    pub sv: Array1<f64>,
    /// cols × k
    pub v: Array2<f64>,
}

impl Svd {
    /// Default zero threshold for singular values,
    /// `0.5 · sqrt(m + n + 1) · sv_max · eps`.
    pub fn default_threshold(&self) -> f64 {
        let (m, n) = (self.u.nrows(), self.v.nrows());
        let sv_max = self.sv.first().copied().unwrap_or(0.0);
        0.5 * ((m + n + 1) as f64).sqrt() * sv_max * f64::EPSILON
    }

    /// Number of singular values above `threshold`.
    pub fn rank(&self, threshold: f64) -> usize {
        self.sv.iter().filter(|&&s| s > threshold).count()
    }

    /// Rebuild `U · diag(sv) · Vᵗ`.
    pub fn reconstruct(&self) -> Array2<f64> {
        let (m, k) = self.u.dim();
        let n = self.v.nrows();
        let mut a = Array2::zeros((m, n));
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for l in 0..k {
                    sum += self.u[[i, l]] * self.sv[l] * self.v[[j, l]];
                }
                a[[i, j]] = sum;
            }
        }
        a
    }
}

fn pythag(a: f64, b: f64) -> f64 {
    a.hypot(b)
}

fn with_sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// Singular value decomposition by Householder bidiagonalisation followed
/// by implicit-shift QR.
///
/// Singular values are returned in descending order. Column signs are
/// normalised so that most entries of each singular vector pair are
/// non-negative. Returns `None` if the QR iteration fails to converge or the
/// input is not finite.
pub fn svd(a: &Array2<f64>) -> Option<Svd> {
    let (rows, cols) = a.dim();
    if rows == 0 || cols == 0 || a.iter().any(|v| !v.is_finite()) {
        return None;
    }
    // The bidiagonalisation below wants at least as many rows as columns.
    let m = rows.max(cols);
    let n = cols;
    let mut u = Array2::zeros((m, n));
    for i in 0..rows {
        for j in 0..n {
            u[[i, j]] = a[[i, j]];
        }
    }
    let mut w = vec![0.0; n];
    let mut v = Array2::zeros((n, n));
    let mut rv1 = vec![0.0; n];
    let eps = f64::EPSILON;

    let mut g = 0.0_f64;
    let mut scale = 0.0_f64;
    let mut anorm = 0.0_f64;
    let mut l = 0usize;

    // Householder reduction to bidiagonal form.
    for i in 0..n {
        l = i + 1;
        rv1[i] = scale * g;
        g = 0.0;
        let mut s = 0.0;
        scale = 0.0;
        if i < m {
            for k in i..m {
                scale += u[[k, i]].abs();
            }
            if scale != 0.0 {
                for k in i..m {
                    u[[k, i]] /= scale;
                    s += u[[k, i]] * u[[k, i]];
                }
                let f = u[[i, i]];
                g = -with_sign(s.sqrt(), f);
                let h = f * g - s;
                u[[i, i]] = f - g;
                for j in l..n {
                    let mut s2 = 0.0;
                    for k in i..m {
                        s2 += u[[k, i]] * u[[k, j]];
                    }
                    let f2 = s2 / h;
                    for k in i..m {
                        u[[k, j]] += f2 * u[[k, i]];
                    }
                }
                for k in i..m {
                    u[[k, i]] *= scale;
                }
            }
        }
        w[i] = scale * g;
        g = 0.0;
        s = 0.0;
        scale = 0.0;
        if i < m && i + 1 != n {
            for k in l..n {
                scale += u[[i, k]].abs();
            }
            if scale != 0.0 {
                for k in l..n {
                    u[[i, k]] /= scale;
                    s += u[[i, k]] * u[[i, k]];
                }
                let f = u[[i, l]];
                g = -with_sign(s.sqrt(), f);
                let h = f * g - s;
                u[[i, l]] = f - g;
                for k in l..n {
                    rv1[k] = u[[i, k]] / h;
                }
                for j in l..m {
                    let mut s2 = 0.0;
                    for k in l..n {
                        s2 += u[[j, k]] * u[[i, k]];
                    }
                    for k in l..n {
                        u[[j, k]] += s2 * rv1[k];
                    }
                }
                for k in l..n {
                    u[[i, k]] *= scale;
                }
            }
        }
        anorm = anorm.max(w[i].abs() + rv1[i].abs());
    }

    // Accumulate right-hand transformations.
    for i in (0..n).rev() {
        if i < n - 1 {
            if g != 0.0 {
                for j in l..n {
                    v[[j, i]] = (u[[i, j]] / u[[i, l]]) / g;
                }
                for j in l..n {
                    let mut s = 0.0;
                    for k in l..n {
                        s += u[[i, k]] * v[[k, j]];
                    }
                    for k in l..n {
                        v[[k, j]] += s * v[[k, i]];
                    }
                }
            }
            for j in l..n {
                v[[i, j]] = 0.0;
                v[[j, i]] = 0.0;
            }
        }
        v[[i, i]] = 1.0;
        g = rv1[i];
        l = i;
    }

    // Accumulate left-hand transformations.
    for i in (0..m.min(n)).rev() {
        let l = i + 1;
        let mut g = w[i];
        for j in l..n {
            u[[i, j]] = 0.0;
        }
        if g != 0.0 {
            g = 1.0 / g;
            for j in l..n {
                let mut s = 0.0;
                for k in l..m {
                    s += u[[k, i]] * u[[k, j]];
                }
                let f = (s / u[[i, i]]) * g;
                for k in i..m {
                    u[[k, j]] += f * u[[k, i]];
                }
            }
            for j in i..m {
                u[[j, i]] *= g;
            }
        } else {
            for j in i..m {
                u[[j, i]] = 0.0;
            }
        }
        u[[i, i]] += 1.0;
    }

    // Diagonalise the bidiagonal form.
    for k in (0..n).rev() {
        let mut sweep = 0usize;
        loop {
            // Test for splitting; rv1[0] is always zero.
            let mut l = k;
            let mut cancel = true;
            loop {
                if l == 0 || rv1[l].abs() <= eps * anorm {
                    cancel = false;
                    break;
                }
                if w[l - 1].abs() <= eps * anorm {
                    break;
                }
                l -= 1;
            }
            if cancel {
                let nm = l - 1;
                let mut c = 0.0;
                let mut s = 1.0;
                for i in l..=k {
                    let f = s * rv1[i];
                    rv1[i] *= c;
                    if f.abs() <= eps * anorm {
                        break;
                    }
                    let g = w[i];
                    let h = pythag(f, g);
                    w[i] = h;
                    let hi = 1.0 / h;
                    c = g * hi;
                    s = -f * hi;
                    for j in 0..m {
                        let y = u[[j, nm]];
                        let z = u[[j, i]];
                        u[[j, nm]] = y * c + z * s;
                        u[[j, i]] = z * c - y * s;
                    }
                }
            }
            let z = w[k];
            if l == k {
                if z < 0.0 {
                    w[k] = -z;
                    for j in 0..n {
                        v[[j, k]] = -v[[j, k]];
                    }
                }
                break;
            }
            if sweep == MAX_QR_SWEEPS {
                return None;
            }
            sweep += 1;

            // Shift from the bottom 2x2 minor.
            let mut x = w[l];
            let nm = k - 1;
            let mut y = w[nm];
            let mut g = rv1[nm];
            let mut h = rv1[k];
            let mut f = ((y - z) * (y + z) + (g - h) * (g + h)) / (2.0 * h * y);
            g = pythag(f, 1.0);
            f = ((x - z) * (x + z) + h * ((y / (f + with_sign(g, f))) - h)) / x;

            // Next QR transformation.
            let mut c = 1.0;
            let mut s = 1.0;
            for j in l..=nm {
                let i = j + 1;
                g = rv1[i];
                y = w[i];
                h = s * g;
                g *= c;
                let mut zz = pythag(f, h);
                rv1[j] = zz;
                c = f / zz;
                s = h / zz;
                f = x * c + g * s;
                g = g * c - x * s;
                h = y * s;
                y *= c;
                for jj in 0..n {
                    let xv = v[[jj, j]];
                    let zv = v[[jj, i]];
                    v[[jj, j]] = xv * c + zv * s;
                    v[[jj, i]] = zv * c - xv * s;
                }
                zz = pythag(f, h);
                w[j] = zz;
                if zz != 0.0 {
                    let zi = 1.0 / zz;
                    c = f * zi;
                    s = h * zi;
                }
                f = c * g + s * y;
                x = c * y - s * g;
                for jj in 0..m {
                    let yu = u[[jj, j]];
                    let zu = u[[jj, i]];
                    u[[jj, j]] = yu * c + zu * s;
                    u[[jj, i]] = zu * c - yu * s;
                }
            }
            rv1[l] = 0.0;
            rv1[k] = f;
            w[k] = x;
        }
    }

    // Descending order, then sign convention.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| w[j].partial_cmp(&w[i]).unwrap_or(std::cmp::Ordering::Equal));

    let mut u_out = Array2::zeros((rows, n));
    let mut v_out = Array2::zeros((n, n));
    let mut sv = Array1::zeros(n);
    for (dst, &src) in order.iter().enumerate() {
        sv[dst] = w[src];
        let negatives = (0..rows).filter(|&i| u[[i, src]] < 0.0).count()
            + (0..n).filter(|&j| v[[j, src]] < 0.0).count();
        let sign = if negatives > (rows + n) / 2 { -1.0 } else { 1.0 };
        for i in 0..rows {
            u_out[[i, dst]] = sign * u[[i, src]];
        }
        for j in 0..n {
            v_out[[j, dst]] = sign * v[[j, src]];
        }
    }

    Some(Svd {
        u: u_out,
        sv,
        v: v_out,
    })
}

/// Eigendecomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns (eigenvalues, eigenvectors) sorted by descending eigenvalue;
/// eigenvectors are the columns of the returned matrix.
pub fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut ata = a.clone();
    let mut v = Array2::eye(n);
    let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let tol = f64::EPSILON * norm.max(f64::MIN_POSITIVE);

    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off_diag = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off_diag += ata[[i, j]] * ata[[i, j]];
            }
        }
        if off_diag.sqrt() <= tol {
            break;
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if ata[[i, j]].abs() <= tol * 1e-3 {
                    continue;
                }
                let tau = (ata[[j, j]] - ata[[i, i]]) / (2.0 * ata[[i, j]]);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let cos = 1.0 / (1.0 + t * t).sqrt();
                let sin = t * cos;

                let aii = ata[[i, i]];
                let ajj = ata[[j, j]];
                let aij = ata[[i, j]];
                ata[[i, i]] = cos * cos * aii - 2.0 * sin * cos * aij + sin * sin * ajj;
                ata[[j, j]] = sin * sin * aii + 2.0 * sin * cos * aij + cos * cos * ajj;
                ata[[i, j]] = 0.0;
                ata[[j, i]] = 0.0;

                for r in 0..n {
                    if r == i || r == j {
                        continue;
                    }
                    let ri = ata[[r, i]];
                    let rj = ata[[r, j]];
                    ata[[r, i]] = cos * ri - sin * rj;
                    ata[[i, r]] = ata[[r, i]];
                    ata[[r, j]] = sin * ri + cos * rj;
                    ata[[j, r]] = ata[[r, j]];
                }

                for r in 0..n {
                    let vi = v[[r, i]];
                    let vj = v[[r, j]];
                    v[[r, i]] = cos * vi - sin * vj;
                    v[[r, j]] = sin * vi + cos * vj;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        ata[[j, j]]
            .partial_cmp(&ata[[i, i]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut values = Array1::zeros(n);
    let mut vectors = Array2::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        values[dst] = ata[[src, src]];
        for r in 0..n {
            vectors[[r, dst]] = v[[r, src]];
        }
    }
    (values, vectors)
}

/// 2x2 eigenvalue decomposition.
///
/// Returns (eigenvalues, eigenvectors) sorted by ascending eigenvalue.
pub fn eig_2x2(a: &[[f64; 2]; 2]) -> ([f64; 2], [[f64; 2]; 2]) {
    let trace = a[0][0] + a[1][1];
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    let disc = trace * trace - 4.0 * det;

    if disc < 0.0 {
        // Complex pair; real parts only
        let re = trace / 2.0;
        return ([re, re], [[1.0, 0.0], [0.0, 1.0]]);
    }

    let sqrt_disc = disc.sqrt();
    let l1 = (trace - sqrt_disc) / 2.0;
    let l2 = (trace + sqrt_disc) / 2.0;

    let eigvec = |lambda: f64, fallback: [f64; 2]| {
        if a[0][1].abs() > 1e-15 {
            let x = lambda - a[1][1];
            let y = a[1][0];
            let norm = (x * x + y * y).sqrt();
            [x / norm, y / norm]
        } else if a[1][0].abs() > 1e-15 {
            let x = a[0][1];
            let y = lambda - a[0][0];
            let norm = (x * x + y * y).sqrt();
            [x / norm, y / norm]
        } else {
            fallback
        }
    };

    // Diagonal input: pair each eigenvalue with its own axis.
    if a[0][1].abs() <= 1e-15 && a[1][0].abs() <= 1e-15 && a[0][0] > a[1][1] {
        return ([l1, l2], [[0.0, 1.0], [1.0, 0.0]]);
    }

    ([l1, l2], [eigvec(l1, [1.0, 0.0]), eigvec(l2, [0.0, 1.0])])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
        assert_eq!(a.dim(), b.dim());
        for ((i, j), &x) in a.indexed_iter() {
            let diff: f64 = x - b[[i, j]];
            assert!(diff.abs() < tol, "({i}, {j}): {x} vs {}", b[[i, j]]);
        }
    }

    #[test]
    fn test_eig_2x2_diagonal() {
        let a = [[3.0, 0.0], [0.0, 5.0]];
        let (vals, vecs) = eig_2x2(&a);
        assert!((vals[0] - 3.0).abs() < 1e-10);
        assert!((vals[1] - 5.0).abs() < 1e-10);
        assert_eq!(vecs[1], [0.0, 1.0]);

        let (vals, vecs) = eig_2x2(&[[5.0, 0.0], [0.0, 3.0]]);
        assert!((vals[0] - 3.0).abs() < 1e-10);
        assert_eq!(vecs[0], [0.0, 1.0]);
    }

    #[test]
    fn test_eig_2x2_symmetric() {
        let a = [[2.0, 1.0], [1.0, 2.0]];
        let (vals, vecs) = eig_2x2(&a);
        assert!((vals[0] - 1.0).abs() < 1e-10);
        assert!((vals[1] - 3.0).abs() < 1e-10);
        assert!((vecs[1][0] - vecs[1][1]).abs() < 1e-10);
    }

    #[test]
    fn test_svd_identity() {
        let a = Array2::eye(3);
        let d = svd(&a).unwrap();
        for i in 0..3 {
            assert!((d.sv[i] - 1.0).abs() < 1e-12, "sv[{i}] = {}", d.sv[i]);
        }
        assert_close(&d.reconstruct(), &a, 1e-12);
    }

    #[test]
    fn test_svd_tall_matrix() {
        let a = Array2::from_shape_fn((7, 4), |(i, j)| ((i * 3 + j * 7) % 11) as f64 - 4.5);
        let d = svd(&a).unwrap();
        assert_close(&d.reconstruct(), &a, 1e-10);
        for w in d.sv.windows(2) {
            assert!(w[0] >= w[1]);
        }
        // V is orthonormal
        let vtv = d.v.t().dot(&d.v);
        assert_close(&vtv, &Array2::eye(4), 1e-10);
    }

    #[test]
    fn test_svd_rank_deficient() {
        // Third column = first + second
        let a = Array2::from_shape_fn((6, 3), |(i, j)| {
            let c0 = i as f64;
            let c1 = (i * i) as f64 * 0.1;
            match j {
                0 => c0,
                1 => c1,
                _ => c0 + c1,
            }
        });
        let d = svd(&a).unwrap();
        assert_eq!(d.rank(d.default_threshold() * 1e3), 2);
        assert_close(&d.reconstruct(), &a, 1e-10);
    }

    #[test]
    fn test_svd_wide_matrix() {
        let a = Array2::from_shape_fn((2, 4), |(i, j)| (i + 2 * j) as f64 + 1.0);
        let d = svd(&a).unwrap();
        assert_close(&d.reconstruct(), &a, 1e-10);
        assert_eq!(d.u.nrows(), 2);
    }

    #[test]
    fn test_svd_rejects_nan() {
        let mut a = Array2::eye(2);
        a[[0, 1]] = f64::NAN;
        assert!(svd(&a).is_none());
    }

    #[test]
    fn test_symmetric_eigen_reconstructs() {
        let a = ndarray::arr2(&[[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]]);
        let (vals, vecs) = symmetric_eigen(&a);
        assert!(vals[0] >= vals[1] && vals[1] >= vals[2]);
        let mut rebuilt = Array2::zeros((3, 3));
        for k in 0..3 {
            for i in 0..3 {
                for j in 0..3 {
                    rebuilt[[i, j]] += vecs[[i, k]] * vals[k] * vecs[[j, k]];
                }
            }
        }
        assert_close(&rebuilt, &a, 1e-10);
    }

    #[test]
    fn test_symmetric_eigen_singular_block() {
        // Two perfectly correlated observations: one zero eigenvalue.
        let a = ndarray::arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        let (vals, _) = symmetric_eigen(&a);
        assert!((vals[0] - 2.0).abs() < 1e-12);
        assert!(vals[1].abs() < 1e-12);
    }
}
