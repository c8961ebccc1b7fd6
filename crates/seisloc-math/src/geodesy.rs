// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Spherical Geodesy
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Great-circle distance, azimuth and forward problem on the sphere.

/// Distance and azimuths between two points.
///
/// Returns `(delta, esaz, seaz)` in degrees: epicentral distance, azimuth
/// from point 1 to point 2 and azimuth from point 2 back to point 1, both
/// clockwise from north in [0, 360).
pub fn delaz(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64, f64) {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();

    let cos_d = phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * dlon.cos();
    let a = phi2.cos() * dlon.sin();
    let b = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    let sin_d = (a * a + b * b).sqrt();
    let delta = sin_d.atan2(cos_d).to_degrees();

    let esaz = normalize_azimuth(a.atan2(b).to_degrees());
    let a2 = -phi1.cos() * dlon.sin();
    let b2 = phi2.cos() * phi1.sin() - phi2.sin() * phi1.cos() * dlon.cos();
    let seaz = normalize_azimuth(a2.atan2(b2).to_degrees());

    (delta, esaz, seaz)
}

/// Point reached travelling `delta` degrees from `(lat, lon)` along
/// azimuth `azimuth` (degrees). Longitude is returned in [-180, 180).
pub fn point_at(lat: f64, lon: f64, delta: f64, azimuth: f64) -> (f64, f64) {
    let phi1 = lat.to_radians();
    let d = delta.to_radians();
    let az = azimuth.to_radians();

    let sin_phi2 = phi1.sin() * d.cos() + phi1.cos() * d.sin() * az.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let dlon = (az.sin() * d.sin() * phi1.cos()).atan2(d.cos() - phi1.sin() * sin_phi2);

    (phi2.to_degrees(), normalize_longitude(lon + dlon.to_degrees()))
}

pub fn normalize_azimuth(az: f64) -> f64 {
    let a = az.rem_euclid(360.0);
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delaz_along_equator() {
        let (d, esaz, seaz) = delaz(0.0, 0.0, 0.0, 10.0);
        assert!((d - 10.0).abs() < 1e-10);
        assert!((esaz - 90.0).abs() < 1e-10);
        assert!((seaz - 270.0).abs() < 1e-10);
    }

    #[test]
    fn test_delaz_along_meridian() {
        let (d, esaz, seaz) = delaz(10.0, 20.0, 40.0, 20.0);
        assert!((d - 30.0).abs() < 1e-10);
        assert!(esaz.abs() < 1e-10);
        assert!((seaz - 180.0).abs() < 1e-10);
    }

    #[test]
    fn test_point_at_inverts_delaz() {
        let (lat, lon) = (35.0, -120.0);
        for &(delta, az) in &[(1.0, 45.0), (25.0, 200.0), (80.0, 330.0)] {
            let (lat2, lon2) = point_at(lat, lon, delta, az);
            let (d, esaz, _) = delaz(lat, lon, lat2, lon2);
            assert!((d - delta).abs() < 1e-8, "delta {d} vs {delta}");
            assert!((esaz - az).abs() < 1e-6, "az {esaz} vs {az}");
        }
    }

    #[test]
    fn test_normalize_longitude() {
        assert!((normalize_longitude(190.0) + 170.0).abs() < 1e-12);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-12);
    }
}
