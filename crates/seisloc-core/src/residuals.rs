// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Residuals
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Station geometry, travel-time residuals and residual statistics with
//! respect to the current hypocentre.

use std::collections::BTreeSet;

use seisloc_math::geodesy::delaz;
use seisloc_types::state::{Hypocentre, Phase, ResidualStats, Station};

use crate::travel_time::Predictor;

/// Recompute distance and azimuths of every phase from `hypo`.
pub fn compute_geometry(phases: &mut [Phase], stations: &[Station], hypo: &Hypocentre) {
    for p in phases.iter_mut() {
        if let Some(sta) = stations.get(p.station) {
            let (delta, esaz, seaz) = delaz(hypo.lat, hypo.lon, sta.lat, sta.lon);
            p.delta = delta;
            p.esaz = esaz;
            p.seaz = seaz;
        }
    }
}

/// Re-predict travel times and residuals of identified phases.
///
/// A phase the model can no longer predict keeps its name but loses its
/// residual and becomes non-defining. Returns the number of defining
/// phases afterwards.
pub fn compute_residuals(phases: &mut [Phase], predictor: &Predictor, hypo: &Hypocentre) -> usize {
    for p in phases.iter_mut() {
        if p.phase.is_empty() {
            continue;
        }
        let Some(obs) = p.arrival_time else {
            p.time_defining = false;
            continue;
        };
        match predictor.predict(&p.phase, p, hypo) {
            Some(tt) => {
                p.ttime = Some(tt.time);
                p.dtdd = tt.dtdd;
                p.dtdh = tt.dtdh;
                p.bounce_delta = tt.bounce_delta;
                p.residual = Some(obs - hypo.origin_time - tt.time);
            }
            None => {
                p.ttime = None;
                p.residual = None;
                p.time_defining = false;
            }
        }
    }
    count_defining(phases)
}

/// Make non-defining every defining phase with `|residual| > threshold·error`.
/// Returns how many were demoted.
pub fn demote_outliers(phases: &mut [Phase], sigma_threshold: f64) -> usize {
    let mut demoted = 0;
    for p in phases.iter_mut().filter(|p| p.time_defining) {
        let outlier = match p.residual {
            Some(r) => r.abs() > sigma_threshold * p.measurement_error,
            None => true,
        };
        if outlier {
            p.time_defining = false;
            demoted += 1;
        }
    }
    demoted
}

pub fn count_defining(phases: &[Phase]) -> usize {
    phases.iter().filter(|p| p.time_defining).count()
}

/// Largest gap (deg) in a set of azimuths; `None` for fewer than two.
pub fn azimuthal_gap(azimuths: &[f64]) -> Option<f64> {
    let gaps = azimuth_gaps(azimuths)?;
    gaps.into_iter().reduce(f64::max)
}

/// Largest gap filled in by removing any single azimuth.
pub fn secondary_gap(azimuths: &[f64]) -> Option<f64> {
    let gaps = azimuth_gaps(azimuths)?;
    if gaps.len() < 3 {
        return Some(360.0);
    }
    let n = gaps.len();
    (0..n).map(|i| gaps[i] + gaps[(i + 1) % n]).reduce(f64::max)
}

/// Consecutive gaps between sorted azimuths, wrapping through north.
fn azimuth_gaps(azimuths: &[f64]) -> Option<Vec<f64>> {
    if azimuths.len() < 2 {
        return None;
    }
    let mut az = azimuths.to_vec();
    az.sort_by(|a, b| a.total_cmp(b));
    let n = az.len();
    let mut gaps: Vec<f64> = az.windows(2).map(|w| w[1] - w[0]).collect();
    gaps.push(az[0] + 360.0 - az[n - 1]);
    Some(gaps)
}

/// Residual statistics over the defining set.
///
/// `weighted_rms` is the RMS of residuals normalised by their a priori
/// errors.
pub fn residual_stats(phases: &[Phase]) -> ResidualStats {
    let mut stats = ResidualStats {
        nass: phases.iter().filter(|p| !p.phase.is_empty()).count(),
        ..ResidualStats::default()
    };
    let mut sum_sq = 0.0;
    let mut sum_wsq = 0.0;
    let mut stations: BTreeSet<usize> = BTreeSet::new();
    let mut azimuths = Vec::new();
    for p in phases.iter().filter(|p| p.time_defining) {
        let Some(r) = p.residual else { continue };
        stats.ndef += 1;
        sum_sq += r * r;
        if p.measurement_error > 0.0 {
            sum_wsq += (r / p.measurement_error).powi(2);
        }
        if stations.insert(p.station) {
            azimuths.push(p.esaz);
            stats.min_distance = Some(stats.min_distance.map_or(p.delta, |d| d.min(p.delta)));
            stats.max_distance = Some(stats.max_distance.map_or(p.delta, |d| d.max(p.delta)));
        }
    }
    if stats.ndef > 0 {
        stats.unweighted_rms = (sum_sq / stats.ndef as f64).sqrt();
        stats.weighted_rms = (sum_wsq / stats.ndef as f64).sqrt();
    }
    stats.ndef_stations = stations.len();
    stats.azimuthal_gap = azimuthal_gap(&azimuths);
    stats.secondary_gap = secondary_gap(&azimuths);
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defining(station: usize, residual: f64, error: f64, esaz: f64, delta: f64) -> Phase {
        let mut p = Phase::new(station as u64, station as u64, "ISC", station, "P", 0.0);
        p.phase = "P".to_string();
        p.residual = Some(residual);
        p.measurement_error = error;
        p.time_defining = true;
        p.esaz = esaz;
        p.delta = delta;
        p
    }

    #[test]
    fn test_gaps_four_quadrants() {
        let az = [0.0, 90.0, 180.0, 270.0];
        assert_eq!(azimuthal_gap(&az), Some(90.0));
        assert_eq!(secondary_gap(&az), Some(180.0));
    }

    #[test]
    fn test_gap_wraps_through_north() {
        let az = [350.0, 10.0, 20.0];
        assert_eq!(azimuthal_gap(&az), Some(330.0));
        assert!(azimuthal_gap(&[42.0]).is_none());
    }

    #[test]
    fn test_residual_stats() {
        let mut phases = vec![
            defining(0, 1.0, 1.0, 0.0, 1.0),
            defining(1, -1.0, 0.5, 120.0, 3.0),
            defining(2, 2.0, 2.0, 240.0, 2.0),
        ];
        let mut off = defining(3, 50.0, 1.0, 10.0, 9.0);
        off.time_defining = false;
        phases.push(off);
        let s = residual_stats(&phases);
        assert_eq!(s.nass, 4);
        assert_eq!(s.ndef, 3);
        assert_eq!(s.ndef_stations, 3);
        assert!((s.unweighted_rms - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((s.weighted_rms - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(s.min_distance, Some(1.0));
        assert_eq!(s.max_distance, Some(3.0));
        assert_eq!(s.azimuthal_gap, Some(120.0));
    }

    #[test]
    fn test_demote_outliers() {
        let mut phases = vec![defining(0, 5.0, 1.0, 0.0, 1.0), defining(1, 7.0, 1.0, 0.0, 1.0)];
        assert_eq!(demote_outliers(&mut phases, 6.0), 1);
        assert!(phases[0].time_defining);
        assert!(!phases[1].time_defining);
    }
}
