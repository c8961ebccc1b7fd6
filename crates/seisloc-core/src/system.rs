// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Linear System
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::{Array1, Array2};
use seisloc_types::constants::DEG2KM;
use seisloc_types::state::{Parameter, Phase};

use crate::covariance::DataCovariance;

/// Design matrix and residual vector of one iteration.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    /// rows × free parameters
    pub g: Array2<f64>,
    pub d: Array1<f64>,
    /// Phase index of each row.
    pub rows: Vec<usize>,
    pub free: Vec<Parameter>,
    /// RMS of the raw residuals, before any weighting.
    pub unweighted_rms: f64,
    /// Rows carrying independent information after weighting.
    pub effective_rows: usize,
}

/// Travel-time partial derivative of one phase w.r.t. `param`.
///
/// East and north are km shifts of the epicentre; moving towards the
/// station shortens the path by the projection on the azimuth.
pub fn partial_derivative(p: &Phase, param: Parameter) -> f64 {
    let az = p.esaz.to_radians();
    match param {
        Parameter::OriginTime => 1.0,
        Parameter::East => -p.dtdd * az.sin() / DEG2KM,
        Parameter::North => -p.dtdd * az.cos() / DEG2KM,
        Parameter::Depth => p.dtdh,
    }
}

impl LinearSystem {
    /// Build `G` and `d` for `rows` (phase indices) over the free
    /// parameters.
    pub fn build(phases: &[Phase], rows: &[usize], free: &[Parameter]) -> Self {
        let n = rows.len();
        let mut g = Array2::zeros((n, free.len()));
        let mut d = Array1::zeros(n);
        for (r, &i) in rows.iter().enumerate() {
            let p = &phases[i];
            for (c, &param) in free.iter().enumerate() {
                g[[r, c]] = partial_derivative(p, param);
            }
            d[r] = p.residual.unwrap_or(0.0);
        }
        let unweighted_rms = if n > 0 {
            (d.iter().map(|x| x * x).sum::<f64>() / n as f64).sqrt()
        } else {
            0.0
        };
        Self {
            g,
            d,
            rows: rows.to_vec(),
            free: free.to_vec(),
            unweighted_rms,
            effective_rows: n,
        }
    }

    /// Independence mode: scale each row by its inverse a priori error.
    pub fn weight_by_errors(&mut self, phases: &[Phase]) {
        for (r, &i) in self.rows.iter().enumerate() {
            let err = phases[i].measurement_error;
            let w = if err > 0.0 { 1.0 / err } else { 0.0 };
            self.g.row_mut(r).mapv_inplace(|x| x * w);
            self.d[r] *= w;
        }
        self.effective_rows = self.rows.len();
    }

    /// Correlated-error mode: `G' = W·G`, `d' = W·d`. Rows must be in
    /// the covariance member order.
    pub fn whiten(&mut self, cov: &DataCovariance) {
        self.g = cov.project(&self.g);
        self.d = cov.project_vector(&self.d);
        self.effective_rows = cov.rank();
    }

    /// RMS of the weighted residuals over the independent rows.
    pub fn weighted_rms(&self) -> f64 {
        if self.effective_rows == 0 {
            return 0.0;
        }
        (self.d.iter().map(|x| x * x).sum::<f64>() / self.effective_rows as f64).sqrt()
    }

    pub fn convergence_test(&self) -> f64 {
        paige_saunders(&self.g, &self.d)
    }
}

/// Paige-Saunders test `‖Gᵗd‖ / (‖G‖_F · ‖d‖)`; zero for a zero residual.
pub fn paige_saunders(g: &Array2<f64>, d: &Array1<f64>) -> f64 {
    let dnorm = d.dot(d).sqrt();
    let gnorm = g.iter().map(|x| x * x).sum::<f64>().sqrt();
    if dnorm == 0.0 || gnorm == 0.0 {
        return 0.0;
    }
    let gtd = g.t().dot(d);
    gtd.dot(&gtd).sqrt() / (gnorm * dnorm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn phase(esaz: f64, dtdd: f64, dtdh: f64, residual: f64, err: f64) -> Phase {
        let mut p = Phase::new(0, 0, "ISC", 0, "P", 0.0);
        p.phase = "P".to_string();
        p.esaz = esaz;
        p.dtdd = dtdd;
        p.dtdh = dtdh;
        p.residual = Some(residual);
        p.measurement_error = err;
        p.time_defining = true;
        p
    }

    #[test]
    fn test_jacobian_signs() {
        let p = phase(90.0, DEG2KM, 0.1, 0.0, 1.0);
        // station due east: moving east shortens the path by 1 s/km
        assert!((partial_derivative(&p, Parameter::East) + 1.0).abs() < 1e-12);
        assert!(partial_derivative(&p, Parameter::North).abs() < 1e-12);
        assert_eq!(partial_derivative(&p, Parameter::OriginTime), 1.0);
        assert_eq!(partial_derivative(&p, Parameter::Depth), 0.1);
    }

    #[test]
    fn test_build_omits_fixed_columns() {
        let phases = vec![phase(0.0, 8.0, 0.1, 1.0, 1.0), phase(90.0, 8.0, 0.1, -1.0, 2.0)];
        let free = vec![Parameter::OriginTime, Parameter::East, Parameter::North];
        let mut sys = LinearSystem::build(&phases, &[0, 1], &free);
        assert_eq!(sys.g.dim(), (2, 3));
        assert_eq!(sys.d, array![1.0, -1.0]);
        assert!((sys.unweighted_rms - 1.0).abs() < 1e-12);
        sys.weight_by_errors(&phases);
        assert_eq!(sys.d, array![1.0, -0.5]);
        assert_eq!(sys.g[[1, 0]], 0.5);
        assert!((sys.unweighted_rms - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_paige_saunders() {
        let g = array![[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        // residual orthogonal to range(G): converged
        assert_eq!(paige_saunders(&g, &array![0.0, 0.0, 3.0]), 0.0);
        assert_eq!(paige_saunders(&g, &array![0.0, 0.0, 0.0]), 0.0);
        let t = paige_saunders(&g, &array![1.0, 0.0, 0.0]);
        assert!((t - 1.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
