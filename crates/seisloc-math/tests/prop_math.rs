// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Property-Based Tests (proptest) for seisloc-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for seisloc-math using proptest.
//!
//! Covers: bracketing search, spline interpolation, SVD reconstruction,
//! symmetric eigendecomposition, great-circle geometry.

use ndarray::Array2;
use proptest::prelude::*;
use seisloc_math::geodesy::{delaz, point_at};
use seisloc_math::interp::{bracket, CubicSpline};
use seisloc_math::linalg::{svd, symmetric_eigen};

fn sorted_samples() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01f64..5.0, 2..40).prop_map(|steps| {
        let mut x = Vec::with_capacity(steps.len());
        let mut acc = -10.0;
        for s in steps {
            acc += s;
            x.push(acc);
        }
        x
    })
}

// ── Bracketing ───────────────────────────────────────────────────────

proptest! {
    /// Inside the range the bracket satisfies x[lo] <= xp <= x[hi], hi = lo + 1.
    #[test]
    fn bracket_contains_query(x in sorted_samples(), t in 0.0f64..1.0) {
        let xp = x[0] + t * (x[x.len() - 1] - x[0]);
        let (lo, hi) = bracket(&x, xp);
        prop_assert_eq!(hi, lo + 1);
        prop_assert!(x[lo] <= xp && xp <= x[hi],
            "x[{}] = {}, xp = {}, x[{}] = {}", lo, x[lo], xp, hi, x[hi]);
    }

    /// Outside the range the bracket clamps to the end intervals.
    #[test]
    fn bracket_clamps_outside(x in sorted_samples(), off in 0.001f64..100.0) {
        let n = x.len();
        prop_assert_eq!(bracket(&x, x[0] - off), (0, 1));
        prop_assert_eq!(bracket(&x, x[n - 1] + off), (n - 2, n - 1));
    }

    /// The spline passes through its samples.
    #[test]
    fn spline_interpolates_samples(x in sorted_samples()) {
        let y: Vec<f64> = x.iter().map(|v| (0.3 * v).sin() + 0.1 * v).collect();
        let s = CubicSpline::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            prop_assert!((s.eval(*xi) - yi).abs() < 1e-9);
        }
    }
}

// ── SVD ──────────────────────────────────────────────────────────────

proptest! {
    /// U · diag(sv) · Vᵗ reconstructs A and singular values are non-increasing.
    #[test]
    fn svd_reconstructs(
        (rows, cols, data) in (1usize..5).prop_flat_map(|cols| {
            (cols..cols + 12).prop_flat_map(move |rows| {
                (Just(rows), Just(cols), prop::collection::vec(-100.0f64..100.0, rows * cols))
            })
        })
    ) {
        let a = Array2::from_shape_vec((rows, cols), data).unwrap();
        let d = svd(&a).unwrap();
        let rebuilt = d.reconstruct();
        let scale = d.sv[0].max(1.0);
        for ((i, j), &v) in a.indexed_iter() {
            prop_assert!((rebuilt[[i, j]] - v).abs() < 1e-10 * scale,
                "({}, {}): {} vs {}", i, j, rebuilt[[i, j]], v);
        }
        for w in d.sv.windows(2) {
            prop_assert!(w[0] >= w[1]);
        }
        prop_assert!(d.sv.iter().all(|&s| s >= 0.0));
    }

    /// Symmetric eigendecomposition reconstructs the matrix.
    #[test]
    fn symmetric_eigen_reconstructs(
        (n, data) in (1usize..8).prop_flat_map(|n| {
            (Just(n), prop::collection::vec(-10.0f64..10.0, n * n))
        })
    ) {
        let b = Array2::from_shape_vec((n, n), data).unwrap();
        let a = &b + &b.t();
        let (vals, vecs) = symmetric_eigen(&a);
        for i in 0..n {
            for j in 0..n {
                let mut s = 0.0;
                for k in 0..n {
                    s += vecs[[i, k]] * vals[k] * vecs[[j, k]];
                }
                prop_assert!((s - a[[i, j]]).abs() < 1e-8, "({}, {})", i, j);
            }
        }
    }
}

// ── Geodesy ──────────────────────────────────────────────────────────

proptest! {
    /// Forward and inverse problems agree.
    #[test]
    fn point_at_roundtrip(
        lat in -80.0f64..80.0,
        lon in -180.0f64..180.0,
        delta in 0.1f64..170.0,
        az in 0.0f64..360.0,
    ) {
        let (lat2, lon2) = point_at(lat, lon, delta, az);
        let (d, _, _) = delaz(lat, lon, lat2, lon2);
        prop_assert!((d - delta).abs() < 1e-7);
    }
}
