// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Reserved "no value" sentinel used at the boundary with external
/// bulletins and tables. Inside the locator optional scalars are `Option<f64>`.
pub const NULLVAL: f64 = 9_999_999.0;

/// Mean Earth radius (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of great-circle arc on the mean sphere.
pub const DEG2KM: f64 = std::f64::consts::PI * EARTH_RADIUS_KM / 180.0;

/// Upper-crust P velocity used for bounce-point corrections (km/s)
pub const VP_SURFACE: f64 = 5.8;

/// Upper-crust S velocity used for bounce-point corrections (km/s)
pub const VS_SURFACE: f64 = 3.46;

/// Sound speed in sea water (km/s)
pub const V_WATER: f64 = 1.5;

/// Phases reflected at the free surface above the source.
pub const DEPTH_PHASES: [&str; 5] = ["pP", "pwP", "pS", "sP", "sS"];

/// Core-reflected phases that constrain depth.
pub const CORE_REFLECTIONS: [&str; 2] = ["PcP", "ScS"];

/// True if `value` is the NULLVAL sentinel (either sign).
pub fn is_null(value: f64) -> bool {
    !value.is_finite() || (value.abs() - NULLVAL).abs() < 1.0
}

/// Map the NULLVAL sentinel to `None`.
pub fn non_null(value: f64) -> Option<f64> {
    if is_null(value) {
        None
    } else {
        Some(value)
    }
}

/// Map `None` to the NULLVAL sentinel.
pub fn or_null(value: Option<f64>) -> f64 {
    value.unwrap_or(NULLVAL)
}

/// True for pP, pwP, pS, sP and sS.
pub fn is_depth_phase(phase: &str) -> bool {
    DEPTH_PHASES.contains(&phase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_round_trip() {
        assert!(is_null(NULLVAL));
        assert!(is_null(-NULLVAL));
        assert!(!is_null(0.0));
        assert_eq!(non_null(NULLVAL), None);
        assert_eq!(non_null(12.5), Some(12.5));
        assert_eq!(or_null(None), NULLVAL);
    }

    #[test]
    fn test_deg2km() {
        assert!((DEG2KM - 111.19492664455873).abs() < 1e-9);
    }
}
