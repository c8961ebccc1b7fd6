// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Event Location Loop
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Iterative linearised inversion for one location attempt.
//!
//! Each iteration: residuals at the current hypocentre, outlier
//! demotion, covariance/projection maintenance, G and d, SVD solve,
//! convergence test, hypocentre update. Depth is held fixed during the
//! first `min_iterations - 1` iterations and after air-/deep-quake
//! excursions.

use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use seisloc_math::geodesy::normalize_longitude;
use seisloc_types::config::LocatorConfig;
use seisloc_types::constants::DEG2KM;
use seisloc_types::error::{LocatorError, LocatorResult};
use seisloc_types::state::{FixedParameters, Hypocentre, Parameter, Phase, Reading, Solution, Station};

use crate::convergence::{ConvergenceMonitor, ConvergenceState, IterationSample};
use crate::covariance::{DataCovariance, Variogram};
use crate::depth_resolution::check_depth_phases;
use crate::phase_id::{identify_phases, mark_duplicates, reidentify_phases};
use crate::residuals::{
    compute_geometry, compute_residuals, count_defining, demote_outliers, residual_stats,
};
use crate::solver::{solve, SolverOutput};
use crate::stations::{StationNetwork, StationOrdering};
use crate::system::LinearSystem;
use crate::travel_time::{Predictor, TravelTimeCorrection, TravelTimeModel};
use crate::uncertainty::{calc_error, expand_covariance};

/// Air-/deep-quake excursions tolerated before depth is fixed for good.
const MAX_DEPTH_EXCURSIONS: usize = 2;

/// Collaborators of a location attempt.
#[derive(Clone, Copy)]
pub struct LocatorServices<'a> {
    pub model: &'a dyn TravelTimeModel,
    pub correction: &'a dyn TravelTimeCorrection,
    pub variogram: &'a Variogram,
    pub ordering: &'a dyn StationOrdering,
}

/// Station network and covariance carried across iterations.
struct CorrelatedErrors {
    network: StationNetwork,
    covariance: DataCovariance,
}

/// Move `hypo` by `step × model` over the free parameters.
fn apply_model(hypo: &mut Hypocentre, free: &[Parameter], model: &Array1<f64>, step: f64) {
    let mut east = 0.0;
    let mut north = 0.0;
    for (k, param) in free.iter().enumerate() {
        let dm = step * model[k];
        match param {
            Parameter::OriginTime => hypo.origin_time += dm,
            Parameter::East => east = dm,
            Parameter::North => north = dm,
            Parameter::Depth => hypo.depth += dm,
        }
    }
    let coslat = hypo.lat.to_radians().cos().max(1e-6);
    hypo.lat = (hypo.lat + north / DEG2KM).clamp(-90.0, 90.0);
    hypo.lon = normalize_longitude(hypo.lon + east / (DEG2KM * coslat));
}

fn crossed(before: f64, after: f64, boundary: f64) -> bool {
    (before - boundary) * (after - boundary) < 0.0
}

/// Identify, weight and pair phases against `hypo`.
fn prepare_phases(
    config: &LocatorConfig,
    predictor: &Predictor,
    stations: &[Station],
    phases: &mut [Phase],
    readings: &[Reading],
    hypo: &Hypocentre,
) {
    compute_geometry(phases, stations, hypo);
    identify_phases(phases, readings, predictor, hypo, config);
    mark_duplicates(phases, config.phases.duplicate_tolerance);
    check_depth_phases(phases, readings);
}

/// Residuals of `solution.hypocentre` with nothing solved for.
pub fn fixed_hypocentre_residuals(
    config: &LocatorConfig,
    services: &LocatorServices,
    stations: &[Station],
    phases: &mut [Phase],
    readings: &[Reading],
    solution: &mut Solution,
) {
    let predictor = Predictor::new(services.model, services.correction, stations);
    let hypo = solution.hypocentre;
    prepare_phases(config, &predictor, stations, phases, readings, &hypo);
    compute_residuals(phases, &predictor, &hypo);
    solution.fixed = FixedParameters::ALL;
    solution.number_of_unknowns = 0;
    solution.model_covariance = [[None; 4]; 4];
    solution.uncertainty = Default::default();
    solution.stats = residual_stats(phases);
    solution.data_rank = solution.stats.ndef;
}

/// Locate one event under the fixed-parameter mask in `solution.fixed`,
/// starting from `solution.hypocentre`.
///
/// On success the solution is converged, carries residual statistics,
/// model covariance and uncertainties, and `phases` hold the final
/// residuals and defining flags.
pub fn locate_event(
    config: &LocatorConfig,
    services: &LocatorServices,
    stations: &[Station],
    phases: &mut [Phase],
    readings: &[Reading],
    solution: &mut Solution,
) -> LocatorResult<()> {
    let it = &config.iteration;
    let requested = solution.fixed;
    if requested.number_of_unknowns() == 0 {
        fixed_hypocentre_residuals(config, services, stations, phases, readings, solution);
        solution.converged = true;
        return Ok(());
    }
    let depth_free_requested = !requested.depth;
    let max_depth = config.depth.max_depth_km;
    let predictor = Predictor::new(services.model, services.correction, stations);
    let mut hypo = solution.hypocentre;

    prepare_phases(config, &predictor, stations, phases, readings, &hypo);
    let initial_ndef = count_defining(phases);
    if initial_ndef < it.min_ndef_phases {
        return Err(LocatorError::InsufficientPhases {
            ndef: initial_ndef,
            required: it.min_ndef_phases,
        });
    }

    let mut monitor = ConvergenceMonitor::new(it);
    let mut correlated: Option<CorrelatedErrors> = None;
    let mut excursions = 0usize;
    let mut depth_locked = false;
    let mut hold_depth = false;
    let mut previous_unknowns = None;
    let mut last: Option<(SolverOutput, FixedParameters, usize)> = None;
    let mut converged = false;

    for iteration in 0..it.max_iterations {
        let warmup = depth_free_requested && iteration + 1 < it.min_iterations;
        let mut fixed = requested;
        if depth_free_requested {
            fixed.depth = warmup || depth_locked || hold_depth;
        }
        hold_depth = false;
        let free = fixed.free();
        if previous_unknowns != Some(free.len()) {
            monitor.reset_history();
            previous_unknowns = Some(free.len());
        }

        compute_geometry(phases, stations, &hypo);
        compute_residuals(phases, &predictor, &hypo);
        demote_outliers(phases, it.sigma_threshold);
        let ndef = count_defining(phases);
        if ndef < it.min_ndef_phases {
            let loss_percent = 100.0 * (initial_ndef - ndef) as f64 / initial_ndef as f64;
            warn!("phase loss at iteration {iteration}: {ndef} defining left ({loss_percent:.1}% lost)");
            return Err(LocatorError::PhaseLoss {
                ndef,
                required: it.min_ndef_phases,
                loss_percent,
            });
        }

        if free.is_empty() {
            // depth is the only unknown and is held this iteration
            solution.iterations = iteration + 1;
            if depth_locked {
                let out = solve(&Array2::zeros((0, 0)), &Array1::zeros(0), false)?;
                last = Some((out, fixed, ndef));
                converged = true;
                break;
            }
            continue;
        }

        let (system, rank) = if config.correlation.do_correlated_errors {
            let state = match correlated.take() {
                Some(mut s) if s.network.covers(phases) => {
                    let change = s.covariance.update(phases, &s.network, services.variogram);
                    debug!("covariance update: {change:?}");
                    s
                }
                _ => {
                    let network = StationNetwork::build(phases, stations, services.ordering);
                    let covariance = DataCovariance::build(
                        phases,
                        &network,
                        services.variogram,
                        &config.correlation,
                    );
                    CorrelatedErrors {
                        network,
                        covariance,
                    }
                }
            };
            let state = correlated.insert(state);
            let rank = state.covariance.rank();
            if rank < it.min_ndef_phases {
                return Err(LocatorError::InsufficientIndependentPhases {
                    rank,
                    required: it.min_ndef_phases,
                });
            }
            let mut system = LinearSystem::build(phases, state.covariance.members(), &free);
            system.whiten(&state.covariance);
            (system, rank)
        } else {
            let rows: Vec<usize> = (0..phases.len()).filter(|&i| phases[i].time_defining).collect();
            let mut system = LinearSystem::build(phases, &rows, &free);
            system.weight_by_errors(phases);
            (system, ndef)
        };

        let test = system.convergence_test();
        let weighted_rms = system.weighted_rms();
        let out = solve(&system.g, &system.d, it.allow_damping)?;
        let state = monitor.record(
            iteration,
            IterationSample {
                ndef,
                test,
                model_norm: out.model_norm,
                weighted_rms,
            },
            !warmup,
        );
        debug!(
            "iter {iteration}: ndef {ndef} rank {rank} nunp {} wrms {weighted_rms:.4} urms {:.4} \
             norm {:.4} test {test:.3e} cond {:.1}{} step {}",
            free.len(),
            system.unweighted_rms,
            out.model_norm,
            out.condition,
            if out.damped { " (damped)" } else { "" },
            monitor.step()
        );

        let before = hypo.depth;
        apply_model(&mut hypo, &free, &out.model, monitor.step());
        solution.iterations = iteration + 1;
        last = Some((out, fixed, rank));

        if !fixed.depth && (hypo.depth < 0.0 || hypo.depth > max_depth) {
            let kind = if hypo.depth < 0.0 { "airquake" } else { "deepquake" };
            hypo.depth = hypo.depth.clamp(0.0, max_depth);
            excursions += 1;
            hold_depth = true;
            warn!("{kind} at iteration {iteration}: depth fixed at {:.1} km", hypo.depth);
            if excursions > MAX_DEPTH_EXCURSIONS {
                depth_locked = true;
                warn!("depth fixed for the rest of this attempt");
            }
        }

        if crossed(before, hypo.depth, config.depth.moho_km)
            || crossed(before, hypo.depth, config.depth.conrad_km)
        {
            compute_geometry(phases, stations, &hypo);
            if reidentify_phases(phases, readings, &predictor, &hypo, config) {
                debug!("phases renamed after crossing a crustal boundary");
            }
            mark_duplicates(phases, config.phases.duplicate_tolerance);
            check_depth_phases(phases, readings);
        }

        match state {
            ConvergenceState::Converged => {
                converged = true;
                break;
            }
            ConvergenceState::Diverged => {
                solution.diverged = true;
                warn!("divergent solution at iteration {iteration}");
                return Err(LocatorError::Diverged {
                    iteration,
                    model_norm: monitor_norm(&last),
                });
            }
            ConvergenceState::Iterating => {}
        }
    }

    let Some((out, mut fixed, rank)) = last.filter(|_| converged) else {
        return Err(LocatorError::MaxIterations {
            iterations: it.max_iterations,
        });
    };

    compute_geometry(phases, stations, &hypo);
    compute_residuals(phases, &predictor, &hypo);
    solution.hypocentre = hypo;
    solution.stats = residual_stats(phases);
    solution.data_rank = rank;

    let free = fixed.free();
    let mut covariance = expand_covariance(&free, &out.covariance);
    let at_bound = hypo.depth.abs() <= f64::EPSILON || (max_depth - hypo.depth).abs() <= f64::EPSILON;
    if !fixed.depth && at_bound {
        fixed.depth = true;
        let d = Parameter::Depth.index();
        for k in 0..4 {
            covariance[d][k] = None;
            covariance[k][d] = None;
        }
    }
    solution.fixed = fixed;
    solution.number_of_unknowns = fixed.number_of_unknowns();
    solution.model_covariance = covariance;
    calc_error(solution, it.confidence_level)?;
    solution.converged = true;
    info!(
        "converged after {} iterations: {:.4} {:.4} {:.1} km, ndef {}, wrms {:.3}",
        solution.iterations,
        hypo.lat,
        hypo.lon,
        hypo.depth,
        solution.stats.ndef,
        solution.stats.weighted_rms
    );
    Ok(())
}

fn monitor_norm(last: &Option<(SolverOutput, FixedParameters, usize)>) -> f64 {
    last.as_ref().map_or(0.0, |(out, _, _)| out.model_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_model_moves_epicentre() {
        let mut h = Hypocentre {
            origin_time: 0.0,
            lat: 0.0,
            lon: 0.0,
            depth: 10.0,
        };
        let free = vec![Parameter::OriginTime, Parameter::East, Parameter::North, Parameter::Depth];
        let model = ndarray::array![1.0, DEG2KM, -DEG2KM, 5.0];
        apply_model(&mut h, &free, &model, 0.5);
        assert!((h.origin_time - 0.5).abs() < 1e-12);
        assert!((h.lon - 0.5).abs() < 1e-12);
        assert!((h.lat + 0.5).abs() < 1e-12);
        assert!((h.depth - 12.5).abs() < 1e-12);
    }

    #[test]
    fn test_apply_model_skips_fixed() {
        let mut h = Hypocentre {
            origin_time: 0.0,
            lat: 10.0,
            lon: 179.9,
            depth: 10.0,
        };
        let free = vec![Parameter::East];
        let coslat = 10.0_f64.to_radians().cos();
        apply_model(&mut h, &free, &ndarray::array![0.2 * DEG2KM * coslat], 1.0);
        assert!((h.lon + 179.9).abs() < 1e-9);
        assert_eq!(h.depth, 10.0);
        assert_eq!(h.lat, 10.0);
    }

    #[test]
    fn test_boundary_crossing() {
        assert!(crossed(30.0, 40.0, 35.0));
        assert!(crossed(40.0, 30.0, 35.0));
        assert!(!crossed(30.0, 34.0, 35.0));
        assert!(!crossed(35.0, 40.0, 35.0));
    }
}
