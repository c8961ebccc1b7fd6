// ─────────────────────────────────────────────────────────────────────
// SeisLoc — SVD Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Least-squares solve of `G·m = d` by SVD with adaptive damping.

use ndarray::{Array1, Array2};
use seisloc_math::linalg::svd;
use seisloc_types::error::{LocatorError, LocatorResult};

/// Condition number beyond which the system is rejected.
pub const MAX_CONDITION: f64 = 30_000.0;

/// Cap on the model-perturbation norm of a single step.
pub const MAX_MODEL_NORM: f64 = 1000.0;

/// (condition threshold, fraction of the largest singular value added
/// to the others), strongest first.
const DAMPING_STEPS: [(f64, f64); 3] = [(3000.0, 0.10), (300.0, 0.05), (30.0, 0.01)];

/// Damping fraction for a condition number, if any applies.
pub fn damping_factor(condition: f64) -> Option<f64> {
    DAMPING_STEPS
        .iter()
        .find(|(threshold, _)| condition > *threshold)
        .map(|(_, fraction)| *fraction)
}

/// Inflate all but the dominant singular value. Returns whether
/// anything changed.
pub fn apply_damping(sv: &mut Array1<f64>, condition: f64) -> bool {
    let Some(fraction) = damping_factor(condition) else {
        return false;
    };
    let Some(&sv0) = sv.first() else {
        return false;
    };
    let add = fraction * sv0;
    for s in sv.iter_mut().skip(1) {
        *s += add;
    }
    true
}

#[derive(Debug, Clone)]
pub struct SolverOutput {
    /// Perturbation in free-parameter order.
    pub model: Array1<f64>,
    pub model_norm: f64,
    pub condition: f64,
    pub rank: usize,
    pub damped: bool,
    /// `V·diag(1/sv²)·Vᵗ` over the undamped singular values.
    pub covariance: Array2<f64>,
    pub singular_values: Array1<f64>,
}

/// Solve the (weighted) system for the free parameters.
pub fn solve(g: &Array2<f64>, d: &Array1<f64>, allow_damping: bool) -> LocatorResult<SolverOutput> {
    let nunp = g.ncols();
    if g.nrows() != d.len() {
        return Err(LocatorError::LinAlg(format!(
            "design matrix has {} rows, residual vector {}",
            g.nrows(),
            d.len()
        )));
    }
    if nunp == 0 {
        return Ok(SolverOutput {
            model: Array1::zeros(0),
            model_norm: 0.0,
            condition: 1.0,
            rank: 0,
            damped: false,
            covariance: Array2::zeros((0, 0)),
            singular_values: Array1::zeros(0),
        });
    }
    let dec = svd(g).ok_or_else(|| LocatorError::LinAlg("SVD did not converge".to_string()))?;
    let threshold = dec.default_threshold();
    let rank = dec.rank(threshold);
    if rank < nunp {
        return Err(LocatorError::SingularSystem {
            rank,
            unknowns: nunp,
        });
    }
    let condition = dec.sv[0] / dec.sv[nunp - 1];
    if condition > MAX_CONDITION {
        return Err(LocatorError::IllConditioned {
            condition,
            ceiling: MAX_CONDITION,
        });
    }

    let mut sv = dec.sv.clone();
    let damped = allow_damping && apply_damping(&mut sv, condition);

    let mut model = Array1::zeros(nunp);
    for i in 0..nunp {
        let coeff = dec.u.column(i).dot(d) / sv[i];
        model.scaled_add(coeff, &dec.v.column(i));
    }
    let mut model_norm = model.dot(&model).sqrt();
    if model_norm > MAX_MODEL_NORM {
        model *= MAX_MODEL_NORM / model_norm;
        model_norm = MAX_MODEL_NORM;
    }

    let mut covariance = Array2::zeros((nunp, nunp));
    for i in 0..nunp {
        for j in 0..nunp {
            let mut sum = 0.0;
            for k in 0..nunp {
                sum += dec.v[[i, k]] * dec.v[[j, k]] / (dec.sv[k] * dec.sv[k]);
            }
            covariance[[i, j]] = sum;
        }
    }

    Ok(SolverOutput {
        model,
        model_norm,
        condition,
        rank,
        damped,
        covariance,
        singular_values: dec.sv,
    })
}
