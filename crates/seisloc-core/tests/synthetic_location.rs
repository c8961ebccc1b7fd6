// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Synthetic Location Integration Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! locate_event against noiseless half-space travel times.

mod common;

use common::*;
use seisloc_core::depth_resolution::{check_depth_phases, depth_resolution};
use seisloc_core::locate_event;
use seisloc_core::phase_id::{identify_phases, mark_duplicates};
use seisloc_core::residuals::compute_geometry;
use seisloc_core::travel_time::{NoCorrection, Predictor};
use seisloc_types::config::LocatorConfig;
use seisloc_types::error::LocatorError;
use seisloc_types::state::{index_readings, FixedParameters, Solution};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn locate_noiseless(correlated: bool) -> Solution {
    init_logging();
    let mut config = LocatorConfig::default();
    config.correlation.do_correlated_errors = correlated;
    let model = HalfSpace::default();
    let variogram = variogram();
    let services = services(&model, &variogram);
    let stations = stations_around(&TRUTH, &DISTANCES);
    let mut phases = noiseless_phases(&model, &TRUTH, &stations, true);
    let readings = index_readings(&mut phases);
    let mut solution = Solution::new(SEED, FixedParameters::NONE);
    locate_event(&config, &services, &stations, &mut phases, &readings, &mut solution)
        .expect("noiseless event should locate");
    solution
}

fn assert_recovers_truth(solution: &Solution) {
    let h = solution.hypocentre;
    assert!(solution.converged);
    assert!(!solution.fixed.depth, "depth should stay free");
    assert!((h.lat - TRUTH.lat).abs() < 0.005, "lat {}", h.lat);
    assert!((h.lon - TRUTH.lon).abs() < 0.005, "lon {}", h.lon);
    assert!((h.depth - TRUTH.depth).abs() < 0.5, "depth {}", h.depth);
    assert!((h.origin_time - TRUTH.origin_time).abs() < 0.1, "ot {}", h.origin_time);
    assert!(solution.stats.weighted_rms < 0.05, "wrms {}", solution.stats.weighted_rms);
    assert_eq!(solution.stats.ndef, 2 * DISTANCES.len());
}

#[test]
fn test_noiseless_free_depth_correlated_errors() {
    let solution = locate_noiseless(true);
    assert_recovers_truth(&solution);
    assert!(solution.data_rank >= 4);
    assert!(solution.uncertainty.depth.is_some());
    assert!(solution.uncertainty.ellipse.is_some());
}

#[test]
fn test_noiseless_free_depth_independent_errors() {
    let solution = locate_noiseless(false);
    assert_recovers_truth(&solution);
    assert_eq!(solution.data_rank, 2 * DISTANCES.len());
}

#[test]
fn test_fixed_depth_reports_no_depth_error() {
    let config = LocatorConfig::default();
    let model = HalfSpace::default();
    let variogram = variogram();
    let services = services(&model, &variogram);
    let stations = stations_around(&TRUTH, &DISTANCES);
    let mut phases = noiseless_phases(&model, &TRUTH, &stations, true);
    let readings = index_readings(&mut phases);
    let mut start = SEED;
    start.depth = TRUTH.depth;
    let fixed = FixedParameters {
        depth: true,
        ..FixedParameters::NONE
    };
    let mut solution = Solution::new(start, fixed);
    locate_event(&config, &services, &stations, &mut phases, &readings, &mut solution).unwrap();
    assert!(solution.fixed.depth);
    assert_eq!(solution.number_of_unknowns, 3);
    assert_eq!(solution.hypocentre.depth, TRUTH.depth);
    assert!(solution.uncertainty.depth.is_none());
    assert!((solution.hypocentre.lat - TRUTH.lat).abs() < 0.005);
}

#[test]
fn test_too_few_phases_is_reported() {
    let config = LocatorConfig::default();
    let model = HalfSpace::default();
    let variogram = variogram();
    let services = services(&model, &variogram);
    let stations = stations_around(&TRUTH, &[0.5, 1.0, 1.5]);
    let mut phases = noiseless_phases(&model, &TRUTH, &stations, false);
    let readings = index_readings(&mut phases);
    let mut solution = Solution::new(TRUTH, FixedParameters::NONE);
    let err = locate_event(&config, &services, &stations, &mut phases, &readings, &mut solution)
        .unwrap_err();
    assert!(matches!(err, LocatorError::InsufficientPhases { ndef: 3, required: 4 }));
    assert!(err.is_recoverable());
    assert!(!solution.converged);
}

#[test]
fn test_all_fixed_computes_residuals_only() {
    let config = LocatorConfig::default();
    let model = HalfSpace::default();
    let variogram = variogram();
    let services = services(&model, &variogram);
    let stations = stations_around(&TRUTH, &DISTANCES);
    let mut phases = noiseless_phases(&model, &TRUTH, &stations, true);
    let readings = index_readings(&mut phases);
    let mut solution = Solution::new(TRUTH, FixedParameters::ALL);
    locate_event(&config, &services, &stations, &mut phases, &readings, &mut solution).unwrap();
    assert_eq!(solution.hypocentre, TRUTH);
    assert_eq!(solution.number_of_unknowns, 0);
    assert_eq!(solution.iterations, 0);
    assert!(phases.iter().all(|p| p.residual.map_or(false, |r| r.abs() < 1e-9)));
    assert_eq!(solution.stats.ndef, phases.len());
}

#[test]
fn test_reidentification_is_idempotent() {
    let config = LocatorConfig::default();
    let model = HalfSpace::default();
    let stations = stations_around(&TRUTH, &DISTANCES);
    let mut phases = noiseless_phases(&model, &TRUTH, &stations, true);
    let readings = index_readings(&mut phases);
    let predictor = Predictor::new(&model, &NoCorrection, &stations);

    compute_geometry(&mut phases, &stations, &SEED);
    identify_phases(&mut phases, &readings, &predictor, &SEED, &config);
    mark_duplicates(&mut phases, config.phases.duplicate_tolerance);
    let first: Vec<(String, bool)> =
        phases.iter().map(|p| (p.phase.clone(), p.time_defining)).collect();

    identify_phases(&mut phases, &readings, &predictor, &SEED, &config);
    mark_duplicates(&mut phases, config.phases.duplicate_tolerance);
    let second: Vec<(String, bool)> =
        phases.iter().map(|p| (p.phase.clone(), p.time_defining)).collect();

    assert_eq!(first, second);
    assert!(first.iter().all(|(name, _)| name == "P" || name == "S"));
}

#[test]
fn test_local_station_threshold_is_inclusive() {
    let mut config = LocatorConfig::default();
    config.depth_resolution.min_local_stations = 3;
    config.depth_resolution.min_sp_pairs = 1000;
    let model = HalfSpace::default();
    let stations = stations_around(&TRUTH, &DISTANCES);
    let mut phases = noiseless_phases(&model, &TRUTH, &stations, true);
    let readings = index_readings(&mut phases);
    let predictor = Predictor::new(&model, &NoCorrection, &stations);
    compute_geometry(&mut phases, &stations, &TRUTH);
    identify_phases(&mut phases, &readings, &predictor, &TRUTH, &config);
    check_depth_phases(&mut phases, &readings);

    // three stations within 0.2 deg
    let res = depth_resolution(&phases, &readings, &config.depth_resolution);
    assert_eq!(res.local_stations, 3);
    assert!(res.resolved);

    for p in phases.iter_mut().filter(|p| p.station == 2) {
        p.time_defining = false;
    }
    let res = depth_resolution(&phases, &readings, &config.depth_resolution);
    assert_eq!(res.local_stations, 2);
    assert!(!res.resolved);
}
