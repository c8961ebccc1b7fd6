// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Event Location Policy Loop
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Outer loop over location policies.
//!
//! Policies are tried in a fixed succession until one converges. A
//! free-depth solution with an implausible depth error is discarded in
//! favour of the regional default depth. When every policy fails the
//! event rolls back to a previously reported hypocentre.

use std::fmt;

use log::{info, warn};
use seisloc_math::stats::median;
use seisloc_types::config::LocatorConfig;
use seisloc_types::constants::is_null;
use seisloc_types::error::{LocatorError, LocatorResult};
use seisloc_types::state::{
    index_readings, Event, FixedParameters, Hypocentre, Phase, Reading, ReportedHypocentre,
    Solution,
};

use crate::covariance::Variogram;
use crate::depth_phase::depth_phase_stack;
use crate::depth_resolution::{check_depth_phases, depth_resolution, DepthResolution};
use crate::locate::{fixed_hypocentre_residuals, locate_event, LocatorServices};
use crate::phase_id::{identify_phases, mark_duplicates};
use crate::residuals::compute_geometry;
use crate::stations::{SingleLinkageOrdering, StationOrdering};
use crate::travel_time::{
    DefaultDepthGrid, FlatTopography, NoCorrection, NoSeedSearch, Predictor, SeedSearch,
    TableModel, Topography, TravelTimeCorrection, TravelTimeModel,
};

/// Seconds subtracted from the earliest arrival for a cold start.
const COLD_START_LEAD_S: f64 = 5.0;
/// Reported depths needed for the median-reported-depth policy.
const MIN_REPORTED_DEPTHS: usize = 2;

/// Closed set of location constraints, each with its own fixed mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationPolicy {
    FreeDepth,
    DefaultDepth,
    AnalystDepth,
    MedianReportedDepth,
    FixedEpicentre,
    FixedEpicentreDepth,
    /// Residuals only, nothing solved for.
    FixedHypocentre,
}

impl LocationPolicy {
    /// Parameters held fixed, before any analyst origin-time constraint.
    pub fn fixed(self) -> FixedParameters {
        match self {
            LocationPolicy::FreeDepth => FixedParameters::NONE,
            LocationPolicy::DefaultDepth
            | LocationPolicy::AnalystDepth
            | LocationPolicy::MedianReportedDepth => FixedParameters {
                depth: true,
                ..FixedParameters::NONE
            },
            LocationPolicy::FixedEpicentre => FixedParameters {
                epicentre: true,
                ..FixedParameters::NONE
            },
            LocationPolicy::FixedEpicentreDepth => FixedParameters {
                epicentre: true,
                depth: true,
                ..FixedParameters::NONE
            },
            LocationPolicy::FixedHypocentre => FixedParameters::ALL,
        }
    }

    /// Policy tried after this one fails.
    pub fn next(self) -> Option<Self> {
        match self {
            LocationPolicy::FreeDepth => Some(LocationPolicy::DefaultDepth),
            LocationPolicy::DefaultDepth => Some(LocationPolicy::MedianReportedDepth),
            LocationPolicy::MedianReportedDepth => Some(LocationPolicy::FixedEpicentre),
            LocationPolicy::FixedEpicentre => Some(LocationPolicy::FixedEpicentreDepth),
            LocationPolicy::AnalystDepth => Some(LocationPolicy::FixedEpicentreDepth),
            LocationPolicy::FixedEpicentreDepth | LocationPolicy::FixedHypocentre => None,
        }
    }
}

impl fmt::Display for LocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationPolicy::FreeDepth => "free depth",
            LocationPolicy::DefaultDepth => "default depth",
            LocationPolicy::AnalystDepth => "analyst depth",
            LocationPolicy::MedianReportedDepth => "median reported depth",
            LocationPolicy::FixedEpicentre => "fixed epicentre",
            LocationPolicy::FixedEpicentreDepth => "fixed epicentre and depth",
            LocationPolicy::FixedHypocentre => "fixed hypocentre",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum AttemptOutcome {
    Converged,
    /// The policy had nothing to fix the constrained parameter to.
    Skipped,
    DepthErrorTooLarge { error: f64, ceiling: f64 },
    Failed(LocatorError),
}

#[derive(Debug)]
pub struct Attempt {
    pub policy: LocationPolicy,
    pub outcome: AttemptOutcome,
}

/// Result of [`EventLocator::locate`].
#[derive(Debug)]
pub struct LocationReport {
    pub solution: Solution,
    /// Phases in reading order with final names, residuals and flags.
    pub phases: Vec<Phase>,
    pub readings: Vec<Reading>,
    /// Policy of the accepted solution; `FixedHypocentre` after rollback.
    pub policy: LocationPolicy,
    pub attempts: Vec<Attempt>,
    pub depth_resolution: DepthResolution,
    pub rolled_back: bool,
}

/// Locates events against a fixed configuration and service set.
pub struct EventLocator<'a> {
    config: &'a LocatorConfig,
    model: &'a dyn TravelTimeModel,
    correction: &'a dyn TravelTimeCorrection,
    variogram: &'a Variogram,
    ordering: &'a dyn StationOrdering,
    default_depth: Option<&'a dyn DefaultDepthGrid>,
    seed: &'a dyn SeedSearch,
    topography: &'a dyn Topography,
    tables: Option<&'a TableModel>,
}

impl<'a> EventLocator<'a> {
    pub fn new(
        config: &'a LocatorConfig,
        model: &'a dyn TravelTimeModel,
        variogram: &'a Variogram,
    ) -> Self {
        Self {
            config,
            model,
            correction: &NoCorrection,
            variogram,
            ordering: &SingleLinkageOrdering,
            default_depth: None,
            seed: &NoSeedSearch,
            topography: &FlatTopography { elevation_km: 0.0 },
            tables: None,
        }
    }

    pub fn with_correction(mut self, correction: &'a dyn TravelTimeCorrection) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_ordering(mut self, ordering: &'a dyn StationOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_default_depth(mut self, grid: &'a dyn DefaultDepthGrid) -> Self {
        self.default_depth = Some(grid);
        self
    }

    pub fn with_seed_search(mut self, seed: &'a dyn SeedSearch) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_topography(mut self, topography: &'a dyn Topography) -> Self {
        self.topography = topography;
        self
    }

    /// Tables for the depth-phase stack run on the accepted solution.
    pub fn with_tables(mut self, tables: &'a TableModel) -> Self {
        self.tables = Some(tables);
        self
    }

    fn services(&self) -> LocatorServices<'a> {
        LocatorServices {
            model: self.model,
            correction: self.correction,
            variogram: self.variogram,
            ordering: self.ordering,
        }
    }

    fn default_depth_at(&self, lat: f64, lon: f64) -> f64 {
        self.default_depth
            .and_then(|g| g.default_depth(lat, lon))
            .unwrap_or(self.config.depth.default_depth_km)
    }

    /// Depth error ceiling for a free-depth solution at `depth`.
    fn depth_error_ceiling(&self, depth: f64) -> f64 {
        if depth < self.config.depth.moho_km {
            self.config.depth.max_shallow_depth_error
        } else {
            self.config.depth.max_deep_depth_error
        }
    }

    /// Locate `event`, trying policies until one converges.
    pub fn locate(&self, event: &Event) -> LocatorResult<LocationReport> {
        self.config.validate()?;
        let stations = &event.stations;
        let mut phases = event.phases.clone();
        let readings = index_readings(&mut phases);
        let instructions = &event.instructions;

        let mut start = starting_hypocentre(event, &phases, self.config)?;
        apply_instructions(event, &mut start);
        if let Some(seed) = self.seed.search(&start, &phases, stations) {
            info!(
                "event {}: seeded at {:.3} {:.3} {:.1} km",
                event.id, seed.lat, seed.lon, seed.depth
            );
            start = seed;
            apply_instructions(event, &mut start);
        }

        let predictor = Predictor::new(self.model, self.correction, stations);
        let mut trial = phases.clone();
        compute_geometry(&mut trial, stations, &start);
        identify_phases(&mut trial, &readings, &predictor, &start, self.config);
        mark_duplicates(&mut trial, self.config.phases.duplicate_tolerance);
        check_depth_phases(&mut trial, &readings);
        let resolution = depth_resolution(&trial, &readings, &self.config.depth_resolution);

        let all_fixed = instructions.fixed_epicentre.is_some()
            && instructions.fixed_depth.is_some()
            && instructions.fixed_origin_time.is_some();
        let mut policy = if all_fixed {
            Some(LocationPolicy::FixedHypocentre)
        } else if instructions.fixed_epicentre.is_some() {
            if instructions.fixed_depth.is_some() {
                Some(LocationPolicy::FixedEpicentreDepth)
            } else {
                Some(LocationPolicy::FixedEpicentre)
            }
        } else if instructions.fixed_depth.is_some() {
            Some(LocationPolicy::AnalystDepth)
        } else if resolution.resolved {
            Some(LocationPolicy::FreeDepth)
        } else {
            Some(LocationPolicy::DefaultDepth)
        };
        info!(
            "event {}: depth {}resolved, starting with {}",
            event.id,
            if resolution.resolved { "" } else { "not " },
            policy.map_or_else(String::new, |p| p.to_string())
        );

        let services = self.services();
        let mut attempts = Vec::new();
        while let Some(current) = policy {
            let Some(hypo) = self.constrain(current, event, &start) else {
                info!("event {}: {current} skipped", event.id);
                attempts.push(Attempt {
                    policy: current,
                    outcome: AttemptOutcome::Skipped,
                });
                policy = current.next();
                continue;
            };
            let mut fixed = current.fixed();
            fixed.origin_time |= instructions.fixed_origin_time.is_some();
            let mut solution = Solution::new(hypo, fixed);
            let mut working = phases.clone();
            match locate_event(
                self.config,
                &services,
                stations,
                &mut working,
                &readings,
                &mut solution,
            ) {
                Ok(()) => {
                    let depth_error = (!solution.fixed.depth)
                        .then_some(solution.uncertainty.depth)
                        .flatten();
                    if let Some(error) = depth_error {
                        let ceiling = self.depth_error_ceiling(solution.hypocentre.depth);
                        if error > ceiling {
                            warn!(
                                "event {}: depth error {error:.1} km exceeds {ceiling:.1} km",
                                event.id
                            );
                            attempts.push(Attempt {
                                policy: current,
                                outcome: AttemptOutcome::DepthErrorTooLarge { error, ceiling },
                            });
                            // successor of every depth-free policy holds depth fixed
                            policy = current.next();
                            continue;
                        }
                    }
                    attempts.push(Attempt {
                        policy: current,
                        outcome: AttemptOutcome::Converged,
                    });
                    if let Some(tables) = self.tables {
                        let estimate = depth_phase_stack(
                            &working,
                            &readings,
                            &solution.hypocentre,
                            tables,
                            self.topography,
                            &self.config.depth,
                        );
                        solution.depth_phase = Some(estimate);
                    }
                    info!("event {}: located with {current}", event.id);
                    return Ok(LocationReport {
                        solution,
                        phases: working,
                        readings,
                        policy: current,
                        attempts,
                        depth_resolution: resolution,
                        rolled_back: false,
                    });
                }
                Err(e) if e.is_recoverable() => {
                    info!("event {}: {current} failed: {e}", event.id);
                    attempts.push(Attempt {
                        policy: current,
                        outcome: AttemptOutcome::Failed(e),
                    });
                    policy = current.next();
                }
                Err(e) => return Err(e),
            }
        }

        self.roll_back(event, phases, readings, attempts, resolution)
    }

    /// Starting hypocentre for `policy`, or `None` when the policy has no
    /// value to hold its constrained parameter at.
    fn constrain(
        &self,
        policy: LocationPolicy,
        event: &Event,
        start: &Hypocentre,
    ) -> Option<Hypocentre> {
        let instructions = &event.instructions;
        let mut hypo = *start;
        match policy {
            LocationPolicy::FreeDepth | LocationPolicy::FixedHypocentre => {}
            LocationPolicy::DefaultDepth => hypo.depth = self.default_depth_at(hypo.lat, hypo.lon),
            LocationPolicy::AnalystDepth => hypo.depth = instructions.fixed_depth?,
            LocationPolicy::MedianReportedDepth => hypo.depth = median_reported_depth(&event.reported)?,
            LocationPolicy::FixedEpicentre | LocationPolicy::FixedEpicentreDepth => {
                let (lat, lon) = instructions
                    .fixed_epicentre
                    .or_else(|| event.prime().map(|r| (r.hypocentre.lat, r.hypocentre.lon)))
                    .unwrap_or((start.lat, start.lon));
                hypo.lat = lat;
                hypo.lon = lon;
                if policy == LocationPolicy::FixedEpicentreDepth {
                    hypo.depth = instructions
                        .fixed_depth
                        .unwrap_or_else(|| self.default_depth_at(lat, lon));
                }
            }
        }
        Some(hypo)
    }

    fn roll_back(
        &self,
        event: &Event,
        mut phases: Vec<Phase>,
        readings: Vec<Reading>,
        attempts: Vec<Attempt>,
        resolution: DepthResolution,
    ) -> LocatorResult<LocationReport> {
        let candidates = || event.reported.iter().filter(|r| !r.is_own);
        let Some(previous) = candidates()
            .find(|r| r.is_prime)
            .or_else(|| candidates().next())
        else {
            warn!("event {}: no convergent solution and nothing to roll back to", event.id);
            return Err(LocatorError::NoConvergentSolution {
                attempts: attempts.len(),
            });
        };
        warn!(
            "event {}: no convergent solution, rolling back to {} hypocentre",
            event.id, previous.agency
        );
        let mut hypo = previous.hypocentre;
        if is_null(hypo.depth) {
            hypo.depth = self.config.depth.default_depth_km;
        }
        let mut solution = Solution::new(hypo, FixedParameters::ALL);
        fixed_hypocentre_residuals(
            self.config,
            &self.services(),
            &event.stations,
            &mut phases,
            &readings,
            &mut solution,
        );
        Ok(LocationReport {
            solution,
            phases,
            readings,
            policy: LocationPolicy::FixedHypocentre,
            attempts,
            depth_resolution: resolution,
            rolled_back: true,
        })
    }
}

/// Initial guess: analyst, then prime, then the earliest-arriving station.
fn starting_hypocentre(
    event: &Event,
    phases: &[Phase],
    config: &LocatorConfig,
) -> LocatorResult<Hypocentre> {
    if let Some(h) = event.instructions.initial {
        return Ok(h);
    }
    if let Some(prime) = event.prime() {
        let mut hypo = prime.hypocentre;
        if is_null(hypo.depth) {
            hypo.depth = config.depth.default_depth_km;
        }
        return Ok(hypo);
    }
    let earliest = phases
        .iter()
        .filter_map(|p| p.arrival_time.map(|t| (t, p.station)))
        .min_by(|a, b| a.0.total_cmp(&b.0));
    let Some((time, station)) = earliest else {
        return Err(LocatorError::InsufficientPhases {
            ndef: 0,
            required: config.iteration.min_ndef_phases,
        });
    };
    let Some(sta) = event.stations.get(station) else {
        return Err(LocatorError::ConfigError(format!(
            "phase refers to unknown station index {station}"
        )));
    };
    Ok(Hypocentre {
        origin_time: time - COLD_START_LEAD_S,
        lat: sta.lat,
        lon: sta.lon,
        depth: config.depth.default_depth_km,
    })
}

fn apply_instructions(event: &Event, hypo: &mut Hypocentre) {
    let instructions = &event.instructions;
    if let Some((lat, lon)) = instructions.fixed_epicentre {
        hypo.lat = lat;
        hypo.lon = lon;
    }
    if let Some(depth) = instructions.fixed_depth {
        hypo.depth = depth;
    }
    if let Some(time) = instructions.fixed_origin_time {
        hypo.origin_time = time;
    }
}

/// Median depth over reported hypocentres, when enough report one.
fn median_reported_depth(reported: &[ReportedHypocentre]) -> Option<f64> {
    let depths: Vec<f64> = reported
        .iter()
        .map(|r| r.hypocentre.depth)
        .filter(|d| !is_null(*d))
        .collect();
    if depths.len() < MIN_REPORTED_DEPTHS {
        return None;
    }
    median(&depths)
}
