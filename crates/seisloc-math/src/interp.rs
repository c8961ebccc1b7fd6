//! Interpolation utilities: bracketing search, natural cubic spline and
//! bilinear interpolation on rectilinear tables.
//!
//! Travel-time lookup and depth-phase stacking both go through here.

use crate::tridiag::thomas_solve;
use ndarray::Array2;

/// Fewest samples a spline can be fitted through.
pub const MIN_SAMPLES: usize = 2;

/// Bracket `xp` in the ascending array `x`.
///
/// Returns `(lo, lo + 1)` with `x[lo] <= xp <= x[lo + 1]`, clamped to the
/// first or last interval outside the range. A single-sample array gives
/// `(0, 0)`.
pub fn bracket(x: &[f64], xp: f64) -> (usize, usize) {
    let n = x.len();
    if n < 2 {
        return (0, 0);
    }
    if xp <= x[0] {
        return (0, 1);
    }
    if xp >= x[n - 1] {
        return (n - 2, n - 1);
    }
    let mut lo = 0usize;
    let mut hi = n - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if x[mid] > xp {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo, hi)
}

/// Natural cubic spline through `(x, y)` samples.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    y2: Vec<f64>,
}

impl CubicSpline {
    /// Fit the spline. `None` if there are fewer than [`MIN_SAMPLES`]
    /// samples, the lengths differ, or `x` is not strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n < MIN_SAMPLES || y.len() != n {
            return None;
        }
        if x.windows(2).any(|w| w[1] <= w[0]) || y.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut y2 = vec![0.0; n];
        if n > 2 {
            let m = n - 2;
            let mut a = vec![0.0; m];
            let mut b = vec![0.0; m];
            let mut c = vec![0.0; m];
            let mut d = vec![0.0; m];
            for k in 0..m {
                let i = k + 1;
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                a[k] = h0;
                b[k] = 2.0 * (h0 + h1);
                c[k] = h1;
                d[k] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
            }
            let inner = thomas_solve(&a, &b, &c, &d)?;
            y2[1..n - 1].copy_from_slice(&inner);
        }

        Some(CubicSpline {
            x: x.to_vec(),
            y: y.to_vec(),
            y2,
        })
    }

    pub fn x_range(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Value and first derivative at `xp`. Outside the samples the end
    /// polynomial is extrapolated.
    pub fn eval_with_derivative(&self, xp: f64) -> (f64, f64) {
        let (lo, hi) = bracket(&self.x, xp);
        let h = self.x[hi] - self.x[lo];
        let a = (self.x[hi] - xp) / h;
        let b = (xp - self.x[lo]) / h;
        let value = a * self.y[lo]
            + b * self.y[hi]
            + ((a * a * a - a) * self.y2[lo] + (b * b * b - b) * self.y2[hi]) * h * h / 6.0;
        let slope = (self.y[hi] - self.y[lo]) / h - (3.0 * a * a - 1.0) / 6.0 * h * self.y2[lo]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.y2[hi];
        (value, slope)
    }

    pub fn eval(&self, xp: f64) -> f64 {
        self.eval_with_derivative(xp).0
    }
}

/// Bilinear interpolation on a rectilinear table.
///
/// `table` has `x.len()` rows and `y.len()` columns. Clamps to the table
/// boundaries if outside.
pub fn bilinear(table: &Array2<f64>, x: &[f64], y: &[f64], xp: f64, yp: f64) -> f64 {
    let (ix0, ix1) = bracket(x, xp);
    let (iy0, iy1) = bracket(y, yp);

    let tx = if ix1 > ix0 {
        ((xp - x[ix0]) / (x[ix1] - x[ix0])).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let ty = if iy1 > iy0 {
        ((yp - y[iy0]) / (y[iy1] - y[iy0])).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let v00 = table[[ix0, iy0]];
    let v10 = table[[ix1, iy0]];
    let v01 = table[[ix0, iy1]];
    let v11 = table[[ix1, iy1]];

    (1.0 - tx) * ((1.0 - ty) * v00 + ty * v01) + tx * ((1.0 - ty) * v10 + ty * v11)
}
