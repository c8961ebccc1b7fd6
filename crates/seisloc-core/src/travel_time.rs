// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Travel Times
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Travel-time prediction and the black-box services the locator consumes.
//!
//! Table readers, crustal models and the grid-search seeder live outside
//! this crate; they plug in through the traits below. [`TableModel`] is
//! the in-crate predictor over gridded tables, also used by the
//! depth-phase stacker.

use std::collections::HashMap;

use ndarray::Array2;
use seisloc_math::interp::{bilinear, bracket, CubicSpline, MIN_SAMPLES};
use seisloc_types::constants::is_null;
use seisloc_types::error::{LocatorError, LocatorResult};
use seisloc_types::state::{Hypocentre, Phase, Station};

/// Predicted travel time of one phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelTime {
    /// s
    pub time: f64,
    /// s/deg
    pub dtdd: f64,
    /// s/km
    pub dtdh: f64,
    /// Epicentral distance of the surface reflection point (deg), for
    /// depth phases.
    pub bounce_delta: Option<f64>,
}

/// Travel-time and slowness predictor. `None` for unsupported phases or
/// out-of-table distance/depth.
pub trait TravelTimeModel: Sync {
    fn predict(&self, phase: &str, delta: f64, depth: f64) -> Option<TravelTime>;
}

/// Ellipticity, station elevation and similar path corrections (s).
pub trait TravelTimeCorrection: Sync {
    fn correction(
        &self,
        phase: &str,
        hypocentre: &Hypocentre,
        station: &Station,
        delta: f64,
        esaz: f64,
    ) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl TravelTimeCorrection for NoCorrection {
    fn correction(&self, _: &str, _: &Hypocentre, _: &Station, _: f64, _: f64) -> f64 {
        0.0
    }
}

/// Surface elevation in km (negative below sea level).
pub trait Topography: Sync {
    fn elevation(&self, lat: f64, lon: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTopography {
    pub elevation_km: f64,
}

impl Topography for FlatTopography {
    fn elevation(&self, _lat: f64, _lon: f64) -> f64 {
        self.elevation_km
    }
}

/// Regional default depth (km), e.g. from a gridded seismicity model.
pub trait DefaultDepthGrid: Sync {
    fn default_depth(&self, lat: f64, lon: f64) -> Option<f64>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantDefaultDepth(pub f64);

impl DefaultDepthGrid for ConstantDefaultDepth {
    fn default_depth(&self, _lat: f64, _lon: f64) -> Option<f64> {
        Some(self.0)
    }
}

/// Global search producing the initial hypocentre for the linearised
/// inversion.
pub trait SeedSearch: Sync {
    fn search(&self, start: &Hypocentre, phases: &[Phase], stations: &[Station])
        -> Option<Hypocentre>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSeedSearch;

impl SeedSearch for NoSeedSearch {
    fn search(&self, _: &Hypocentre, _: &[Phase], _: &[Station]) -> Option<Hypocentre> {
        None
    }
}

/// Distance samples on each side of the query used for the local spline.
const SPLINE_HALF_WIDTH: usize = 3;

/// Gridded travel times of one phase over distance (deg) × depth (km).
///
/// Missing nodes hold NULLVAL. Times are splined over distance at the two
/// bracketing depths and interpolated linearly in depth.
#[derive(Debug, Clone)]
pub struct TravelTimeTable {
    pub phase: String,
    pub deltas: Vec<f64>,
    pub depths: Vec<f64>,
    /// `deltas.len() × depths.len()`.
    pub times: Array2<f64>,
    /// Bounce-point distances of a depth phase, same shape as `times`.
    pub bounce: Option<Array2<f64>>,
}

impl TravelTimeTable {
    pub fn new(
        phase: &str,
        deltas: Vec<f64>,
        depths: Vec<f64>,
        times: Array2<f64>,
    ) -> LocatorResult<Self> {
        if times.dim() != (deltas.len(), depths.len()) {
            return Err(LocatorError::ConfigError(format!(
                "travel-time table {phase}: shape {:?} does not match {} distances × {} depths",
                times.dim(),
                deltas.len(),
                depths.len()
            )));
        }
        if deltas.len() < MIN_SAMPLES || depths.is_empty() {
            return Err(LocatorError::ConfigError(format!(
                "travel-time table {phase}: needs at least {MIN_SAMPLES} distances and one depth"
            )));
        }
        let ascending = |v: &[f64]| v.windows(2).all(|w| w[1] > w[0]);
        if !ascending(&deltas) || !ascending(&depths) {
            return Err(LocatorError::ConfigError(format!(
                "travel-time table {phase}: distance and depth samples must be increasing"
            )));
        }
        Ok(Self {
            phase: phase.to_string(),
            deltas,
            depths,
            times,
            bounce: None,
        })
    }

    pub fn with_bounce(mut self, bounce: Array2<f64>) -> LocatorResult<Self> {
        if bounce.dim() != self.times.dim() {
            return Err(LocatorError::ConfigError(format!(
                "travel-time table {}: bounce grid shape mismatch",
                self.phase
            )));
        }
        self.bounce = Some(bounce);
        Ok(self)
    }

    pub fn covers(&self, delta: f64, depth: f64) -> bool {
        let (d0, d1) = (self.deltas[0], self.deltas[self.deltas.len() - 1]);
        let (z0, z1) = (self.depths[0], self.depths[self.depths.len() - 1]);
        delta >= d0 && delta <= d1 && depth >= z0 && depth <= z1
    }

    /// Travel time and its distance derivative at table depth `k`.
    ///
    /// `None` when fewer than [`MIN_SAMPLES`] valid nodes surround `delta`.
    pub fn at_depth_index(&self, delta: f64, k: usize) -> Option<(f64, f64)> {
        if k >= self.depths.len() {
            return None;
        }
        let n = self.deltas.len();
        let (lo, hi) = bracket(&self.deltas, delta);
        let first = lo.saturating_sub(SPLINE_HALF_WIDTH - 1);
        let last = (hi + SPLINE_HALF_WIDTH - 1).min(n - 1);
        let mut x = Vec::with_capacity(last - first + 1);
        let mut y = Vec::with_capacity(last - first + 1);
        for i in first..=last {
            let t = self.times[[i, k]];
            if !is_null(t) && t.is_finite() {
                x.push(self.deltas[i]);
                y.push(t);
            }
        }
        if x.len() < MIN_SAMPLES || delta < x[0] || delta > x[x.len() - 1] {
            return None;
        }
        let spline = CubicSpline::new(&x, &y)?;
        Some(spline.eval_with_derivative(delta))
    }

    pub fn predict(&self, delta: f64, depth: f64) -> Option<TravelTime> {
        if !self.covers(delta, depth) {
            return None;
        }
        let (klo, khi) = if self.depths.len() == 1 {
            (0, 0)
        } else {
            bracket(&self.depths, depth)
        };
        let (t0, s0) = self.at_depth_index(delta, klo)?;
        let (t1, s1) = self.at_depth_index(delta, khi)?;
        let (time, dtdd, dtdh) = if khi == klo {
            (t0, s0, 0.0)
        } else {
            let dz = self.depths[khi] - self.depths[klo];
            let f = (depth - self.depths[klo]) / dz;
            (t0 + f * (t1 - t0), s0 + f * (s1 - s0), (t1 - t0) / dz)
        };
        let bounce_delta = self
            .bounce
            .as_ref()
            .map(|b| bilinear(b, &self.deltas, &self.depths, delta, depth))
            .filter(|b| !is_null(*b));
        Some(TravelTime {
            time,
            dtdd,
            dtdh,
            bounce_delta,
        })
    }
}

/// Set of travel-time tables keyed by phase name.
#[derive(Debug, Clone, Default)]
pub struct TableModel {
    tables: HashMap<String, TravelTimeTable>,
}

impl TableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: TravelTimeTable) {
        self.tables.insert(table.phase.clone(), table);
    }

    /// Table for `phase`. pwP rides on the pP table; the water-column
    /// delay is a bounce-point correction.
    pub fn table(&self, phase: &str) -> Option<&TravelTimeTable> {
        match self.tables.get(phase) {
            Some(t) => Some(t),
            None if phase == "pwP" => self.tables.get("pP"),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TravelTimeModel for TableModel {
    fn predict(&self, phase: &str, delta: f64, depth: f64) -> Option<TravelTime> {
        self.table(phase)?.predict(delta, depth)
    }
}

/// Model plus path corrections, evaluated for one phase at one station.
#[derive(Clone, Copy)]
pub struct Predictor<'a> {
    pub model: &'a dyn TravelTimeModel,
    pub correction: &'a dyn TravelTimeCorrection,
    pub stations: &'a [Station],
}

impl<'a> Predictor<'a> {
    pub fn new(
        model: &'a dyn TravelTimeModel,
        correction: &'a dyn TravelTimeCorrection,
        stations: &'a [Station],
    ) -> Self {
        Self {
            model,
            correction,
            stations,
        }
    }

    /// Corrected prediction of `name` for `phase`'s station. Geometry
    /// (`delta`, `esaz`) must be current.
    pub fn predict(&self, name: &str, phase: &Phase, hypo: &Hypocentre) -> Option<TravelTime> {
        let mut tt = self.model.predict(name, phase.delta, hypo.depth)?;
        if let Some(station) = self.stations.get(phase.station) {
            tt.time += self
                .correction
                .correction(name, hypo, station, phase.delta, phase.esaz);
        }
        Some(tt)
    }
}
