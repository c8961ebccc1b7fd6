// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Uncertainty
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Formal uncertainties and the epicentral error ellipse from the model
//! covariance.

use ndarray::Array2;
use seisloc_math::linalg::eig_2x2;
use seisloc_types::constants::DEG2KM;
use seisloc_types::error::{LocatorError, LocatorResult};
use seisloc_types::state::{ErrorEllipse, Parameter, Solution, Uncertainty};

/// One-dimensional scale factor for a confidence level in percent.
pub fn one_dimensional_factor(confidence: f64) -> LocatorResult<f64> {
    match confidence.round() as i64 {
        90 => Ok(1.645),
        95 => Ok(1.960),
        99 => Ok(2.576),
        _ => Err(LocatorError::ConfigError(format!(
            "iteration.confidence_level {confidence} is not one of 90, 95, 99"
        ))),
    }
}

/// Two-dimensional (ellipse) scale factor `sqrt(-2 ln(1 - p))`.
pub fn two_dimensional_factor(confidence: f64) -> f64 {
    let p = (confidence / 100.0).clamp(0.0, 1.0 - f64::EPSILON);
    (-2.0 * (1.0 - p).ln()).sqrt()
}

/// Spread the free-parameter covariance into the 4×4 slot matrix; fixed
/// parameters stay `None`.
pub fn expand_covariance(free: &[Parameter], covariance: &Array2<f64>) -> [[Option<f64>; 4]; 4] {
    let mut full = [[None; 4]; 4];
    for (i, pi) in free.iter().enumerate() {
        for (j, pj) in free.iter().enumerate() {
            if i < covariance.nrows() && j < covariance.ncols() {
                full[pi.index()][pj.index()] = Some(covariance[[i, j]]);
            }
        }
    }
    full
}

/// Error ellipse from the (east, north) covariance in km².
pub fn error_ellipse(see: f64, snn: f64, sen: f64, factor: f64) -> ErrorEllipse {
    let ([l_min, l_max], [_, major]) = eig_2x2(&[[see, sen], [sen, snn]]);
    let strike = major[0].atan2(major[1]).to_degrees().rem_euclid(180.0);
    ErrorEllipse {
        semi_major: factor * l_max.max(0.0).sqrt(),
        semi_minor: factor * l_min.max(0.0).sqrt(),
        strike: if strike >= 180.0 { 0.0 } else { strike },
    }
}

/// Fill `solution.uncertainty` from its model covariance.
pub fn calc_error(solution: &mut Solution, confidence: f64) -> LocatorResult<()> {
    let k1 = one_dimensional_factor(confidence)?;
    let k2 = two_dimensional_factor(confidence);
    let cov = &solution.model_covariance;
    let var = |p: Parameter| cov[p.index()][p.index()].filter(|v| *v >= 0.0);
    let coslat = solution.hypocentre.lat.to_radians().cos().abs().max(1e-6);

    let mut u = Uncertainty {
        origin_time: var(Parameter::OriginTime).map(|v| k1 * v.sqrt()),
        lat: var(Parameter::North).map(|v| k1 * v.sqrt() / DEG2KM),
        lon: var(Parameter::East).map(|v| k1 * v.sqrt() / (DEG2KM * coslat)),
        depth: var(Parameter::Depth).map(|v| k1 * v.sqrt()),
        ellipse: None,
    };
    if let (Some(see), Some(snn)) = (var(Parameter::East), var(Parameter::North)) {
        let sen = cov[Parameter::East.index()][Parameter::North.index()].unwrap_or(0.0);
        u.ellipse = Some(error_ellipse(see, snn, sen, k2));
    }
    solution.uncertainty = u;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use seisloc_types::state::{FixedParameters, Hypocentre};

    fn solution(fixed: FixedParameters) -> Solution {
        Solution::new(
            Hypocentre {
                origin_time: 0.0,
                lat: 0.0,
                lon: 0.0,
                depth: 10.0,
            },
            fixed,
        )
    }

    #[test]
    fn test_factors() {
        assert_eq!(one_dimensional_factor(90.0).unwrap(), 1.645);
        assert_eq!(one_dimensional_factor(99.0).unwrap(), 2.576);
        assert!(one_dimensional_factor(80.0).is_err());
        assert!((two_dimensional_factor(90.0) - 2.1460).abs() < 1e-4);
    }

    #[test]
    fn test_ellipse_elongated_north() {
        let e = error_ellipse(1.0, 4.0, 0.0, 1.0);
        assert!((e.semi_major - 2.0).abs() < 1e-12);
        assert!((e.semi_minor - 1.0).abs() < 1e-12);
        assert!(e.strike.abs() < 1e-9 || (e.strike - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_ellipse_elongated_east() {
        let e = error_ellipse(9.0, 1.0, 0.0, 1.0);
        assert!((e.semi_major - 3.0).abs() < 1e-12);
        assert!((e.strike - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_ellipse_diagonal_strike() {
        let e = error_ellipse(2.0, 2.0, 1.0, 1.0);
        assert!((e.strike - 45.0).abs() < 1e-9);
        assert!((e.semi_major - 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_depth_leaves_depth_null() {
        let fixed = FixedParameters {
            depth: true,
            ..FixedParameters::NONE
        };
        let mut sol = solution(fixed);
        let free = fixed.free();
        let cov = array![[0.25, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 1.0]];
        sol.model_covariance = expand_covariance(&free, &cov);
        calc_error(&mut sol, 90.0).unwrap();
        let u = sol.uncertainty;
        assert!(u.depth.is_none());
        assert!((u.origin_time.unwrap() - 1.645 * 0.5).abs() < 1e-12);
        assert!((u.lon.unwrap() - 1.645 * 2.0 / DEG2KM).abs() < 1e-12);
        assert!((u.lat.unwrap() - 1.645 / DEG2KM).abs() < 1e-12);
        assert!(u.ellipse.is_some());
        assert!(sol.model_covariance[3][3].is_none());
    }
}
