// ─────────────────────────────────────────────────────────────────────
// SeisLoc — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Seismic station. Elevation in km above sea level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub code: String,
    #[serde(default)]
    pub alt_code: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elevation_km: f64,
}

impl Station {
    pub fn new(code: &str, lat: f64, lon: f64) -> Self {
        Station {
            code: code.to_string(),
            alt_code: None,
            lat,
            lon,
            elevation_km: 0.0,
        }
    }
}

/// P/S type of a phase, taken from its last leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseFamily {
    P,
    S,
    Other,
}

impl PhaseFamily {
    pub fn of(name: &str) -> Self {
        if name == "Lg" {
            return PhaseFamily::S;
        }
        match name.chars().rev().find(|c| *c == 'P' || *c == 'S') {
            Some('P') => PhaseFamily::P,
            Some('S') => PhaseFamily::S,
            _ => PhaseFamily::Other,
        }
    }
}

/// One reported arrival of this event at a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub arrival_id: u64,
    pub reading_id: u64,
    pub agency: String,
    /// Index into the event's station list.
    pub station: usize,
    pub reported_phase: String,
    /// Resolved phase name; empty when unidentified.
    #[serde(default)]
    pub phase: String,
    /// Arrival epoch time (s).
    pub arrival_time: Option<f64>,
    #[serde(default)]
    pub slowness: Option<f64>,
    #[serde(default)]
    pub backazimuth: Option<f64>,
    #[serde(default)]
    pub amplitude: Option<f64>,
    #[serde(default)]
    pub period: Option<f64>,

    // Geometry w.r.t. the current hypocentre.
    #[serde(skip)]
    pub delta: f64,
    #[serde(skip)]
    pub esaz: f64,
    #[serde(skip)]
    pub seaz: f64,

    // Prediction and residual.
    #[serde(skip)]
    pub ttime: Option<f64>,
    #[serde(skip)]
    pub dtdd: f64,
    #[serde(skip)]
    pub dtdh: f64,
    #[serde(skip)]
    pub bounce_delta: Option<f64>,
    #[serde(skip)]
    pub residual: Option<f64>,
    #[serde(skip)]
    pub measurement_error: f64,

    #[serde(skip)]
    pub time_defining: bool,
    #[serde(skip)]
    pub duplicate: bool,
    #[serde(skip)]
    pub first_p: bool,
    #[serde(skip)]
    pub first_s: bool,
    /// Analyst fixed the phase name; identification leaves it alone.
    #[serde(default)]
    pub phase_fixed: bool,
    /// Analyst made the phase non-defining.
    #[serde(default)]
    pub force_undefining: bool,
    /// For depth phases: index of the first-arriving P of the same reading.
    #[serde(skip)]
    pub first_p_index: Option<usize>,
}

impl Phase {
    pub fn new(
        arrival_id: u64,
        reading_id: u64,
        agency: &str,
        station: usize,
        reported_phase: &str,
        arrival_time: f64,
    ) -> Self {
        Phase {
            arrival_id,
            reading_id,
            agency: agency.to_string(),
            station,
            reported_phase: reported_phase.to_string(),
            phase: String::new(),
            arrival_time: Some(arrival_time),
            slowness: None,
            backazimuth: None,
            amplitude: None,
            period: None,
            delta: 0.0,
            esaz: 0.0,
            seaz: 0.0,
            ttime: None,
            dtdd: 0.0,
            dtdh: 0.0,
            bounce_delta: None,
            residual: None,
            measurement_error: 0.0,
            time_defining: false,
            duplicate: false,
            first_p: false,
            first_s: false,
            phase_fixed: false,
            force_undefining: false,
            first_p_index: None,
        }
    }

    pub fn family(&self) -> PhaseFamily {
        PhaseFamily::of(&self.phase)
    }

    /// Residual divided by its a priori error.
    pub fn normalized_residual(&self) -> Option<f64> {
        match self.residual {
            Some(r) if self.measurement_error > 0.0 => Some(r / self.measurement_error),
            _ => None,
        }
    }
}

/// Contiguous index range of one agency/station report in the phase array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub id: u64,
    pub start: usize,
    pub len: usize,
}

impl Reading {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Sort phases by reading, then arrival time, and index the readings.
///
/// Must be rerun whenever the phase array is reordered.
pub fn index_readings(phases: &mut [Phase]) -> Vec<Reading> {
    phases.sort_by(|a, b| {
        a.reading_id.cmp(&b.reading_id).then_with(|| {
            let ta = a.arrival_time.unwrap_or(f64::INFINITY);
            let tb = b.arrival_time.unwrap_or(f64::INFINITY);
            ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    let mut readings: Vec<Reading> = Vec::new();
    for (i, p) in phases.iter().enumerate() {
        match readings.last_mut() {
            Some(r) if r.id == p.reading_id => r.len += 1,
            _ => readings.push(Reading {
                id: p.reading_id,
                start: i,
                len: 1,
            }),
        }
    }
    readings
}

/// Origin time (epoch s), epicentre (deg) and depth (km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hypocentre {
    pub origin_time: f64,
    pub lat: f64,
    pub lon: f64,
    pub depth: f64,
}

/// Model parameters in Jacobian column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    OriginTime = 0,
    East = 1,
    North = 2,
    Depth = 3,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::OriginTime,
        Parameter::East,
        Parameter::North,
        Parameter::Depth,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedParameters {
    pub origin_time: bool,
    pub epicentre: bool,
    pub depth: bool,
}

impl FixedParameters {
    pub const NONE: FixedParameters = FixedParameters {
        origin_time: false,
        epicentre: false,
        depth: false,
    };

    pub const ALL: FixedParameters = FixedParameters {
        origin_time: true,
        epicentre: true,
        depth: true,
    };

    pub fn is_fixed(&self, param: Parameter) -> bool {
        match param {
            Parameter::OriginTime => self.origin_time,
            Parameter::East | Parameter::North => self.epicentre,
            Parameter::Depth => self.depth,
        }
    }

    /// Free parameters in column order.
    pub fn free(&self) -> Vec<Parameter> {
        Parameter::ALL
            .iter()
            .copied()
            .filter(|p| !self.is_fixed(*p))
            .collect()
    }

    pub fn number_of_unknowns(&self) -> usize {
        self.free().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResidualStats {
    pub unweighted_rms: f64,
    pub weighted_rms: f64,
    /// Associated phases.
    pub nass: usize,
    pub ndef: usize,
    pub ndef_stations: usize,
    pub min_distance: Option<f64>,
    pub max_distance: Option<f64>,
    pub azimuthal_gap: Option<f64>,
    pub secondary_gap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorEllipse {
    /// km
    pub semi_major: f64,
    /// km
    pub semi_minor: f64,
    /// Azimuth of the major axis, degrees clockwise from north in [0, 180).
    pub strike: f64,
}

/// Formal uncertainties scaled to the configured confidence level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Uncertainty {
    pub origin_time: Option<f64>,
    /// deg
    pub lat: Option<f64>,
    /// deg
    pub lon: Option<f64>,
    /// km
    pub depth: Option<f64>,
    pub ellipse: Option<ErrorEllipse>,
}

/// Depth from depth-phase stacking. Depth and error are NULLVAL when
/// the stack lacks support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthPhaseEstimate {
    pub depth: f64,
    pub error: f64,
    pub count: usize,
}

impl DepthPhaseEstimate {
    pub fn unresolved() -> Self {
        DepthPhaseEstimate {
            depth: crate::constants::NULLVAL,
            error: crate::constants::NULLVAL,
            count: 0,
        }
    }

    pub fn depth(&self) -> Option<f64> {
        crate::constants::non_null(self.depth)
    }
}

/// Current (or final) hypocentre estimate with bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub hypocentre: Hypocentre,
    pub fixed: FixedParameters,
    pub number_of_unknowns: usize,
    pub converged: bool,
    pub diverged: bool,
    pub iterations: usize,
    pub stats: ResidualStats,
    /// Model covariance in (time s, east km, north km, depth km); `None` for
    /// fixed parameters.
    pub model_covariance: [[Option<f64>; 4]; 4],
    pub uncertainty: Uncertainty,
    /// Rank of the data covariance matrix (independent defining phases).
    pub data_rank: usize,
    pub depth_phase: Option<DepthPhaseEstimate>,
}

impl Solution {
    pub fn new(hypocentre: Hypocentre, fixed: FixedParameters) -> Self {
        Solution {
            hypocentre,
            fixed,
            number_of_unknowns: fixed.number_of_unknowns(),
            converged: false,
            diverged: false,
            iterations: 0,
            stats: ResidualStats::default(),
            model_covariance: [[None; 4]; 4],
            uncertainty: Uncertainty::default(),
            data_rank: 0,
            depth_phase: None,
        }
    }
}

/// Hypocentre reported by an agency (or by a previous run of this locator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedHypocentre {
    pub agency: String,
    pub hypocentre: Hypocentre,
    #[serde(default)]
    pub depth_fixed: bool,
    /// Previous output of this locator.
    #[serde(default)]
    pub is_own: bool,
    #[serde(default)]
    pub is_prime: bool,
}

/// Analyst constraints on the location.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationInstructions {
    #[serde(default)]
    pub fixed_depth: Option<f64>,
    #[serde(default)]
    pub fixed_epicentre: Option<(f64, f64)>,
    #[serde(default)]
    pub fixed_origin_time: Option<f64>,
    /// Starting point overriding the prime hypocentre.
    #[serde(default)]
    pub initial: Option<Hypocentre>,
}

/// Everything known about one event before location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub stations: Vec<Station>,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub reported: Vec<ReportedHypocentre>,
    #[serde(default)]
    pub instructions: LocationInstructions,
}

impl Event {
    /// Prime reported hypocentre, falling back to the first one.
    pub fn prime(&self) -> Option<&ReportedHypocentre> {
        self.reported
            .iter()
            .find(|h| h.is_prime)
            .or_else(|| self.reported.first())
    }
}
