// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{LocatorError, LocatorResult};
use serde::{Deserialize, Serialize};

/// Top-level locator configuration.
///
/// Immutable once built; every entry point borrows it. Missing JSON
/// fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocatorConfig {
    #[serde(default)]
    pub iteration: IterationConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub depth: DepthConfig,
    #[serde(default)]
    pub depth_resolution: DepthResolutionConfig,
    #[serde(default)]
    pub phases: PhaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationConfig {
    #[serde(default = "default_min_iterations")]
    pub min_iterations: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_min_ndef_phases")]
    pub min_ndef_phases: usize,
    /// Residuals beyond this many a priori errors make a phase non-defining.
    #[serde(default = "default_sigma_threshold")]
    pub sigma_threshold: f64,
    #[serde(default = "default_true")]
    pub allow_damping: bool,
    /// Percent confidence for the reported uncertainties: 90, 95 or 99.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,
}

fn default_min_iterations() -> usize {
    4
}
fn default_max_iterations() -> usize {
    20
}
fn default_min_ndef_phases() -> usize {
    4
}
fn default_sigma_threshold() -> f64 {
    6.0
}
fn default_true() -> bool {
    true
}
fn default_confidence_level() -> f64 {
    90.0
}
fn default_convergence_tolerance() -> f64 {
    1e-8
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            min_iterations: default_min_iterations(),
            max_iterations: default_max_iterations(),
            min_ndef_phases: default_min_ndef_phases(),
            sigma_threshold: default_sigma_threshold(),
            allow_damping: true,
            confidence_level: default_confidence_level(),
            convergence_tolerance: default_convergence_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Account for correlated errors via the projection matrix; otherwise
    /// rows are weighted by inverse a priori error.
    #[serde(default = "default_true")]
    pub do_correlated_errors: bool,
    #[serde(default = "default_variance_explained")]
    pub variance_explained_percent: f64,
    /// Fan out per reading / per block / per column with rayon.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_variance_explained() -> f64 {
    95.0
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            do_correlated_errors: true,
            variance_explained_percent: default_variance_explained(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth_km: f64,
    #[serde(default = "default_moho")]
    pub moho_km: f64,
    #[serde(default = "default_conrad")]
    pub conrad_km: f64,
    #[serde(default = "default_depth")]
    pub default_depth_km: f64,
    /// Ceiling on the formal depth error of a free-depth solution above the Moho.
    #[serde(default = "default_max_shallow_error")]
    pub max_shallow_depth_error: f64,
    /// Same ceiling below the Moho.
    #[serde(default = "default_max_deep_error")]
    pub max_deep_depth_error: f64,
    /// Minimum number of depth phases at the depth-phase stack mode.
    #[serde(default = "default_depth_phase_min_count")]
    pub depth_phase_min_count: usize,
}

fn default_max_depth() -> f64 {
    700.0
}
fn default_moho() -> f64 {
    35.0
}
fn default_conrad() -> f64 {
    20.0
}
fn default_depth() -> f64 {
    10.0
}
fn default_max_shallow_error() -> f64 {
    30.0
}
fn default_max_deep_error() -> f64 {
    60.0
}
fn default_depth_phase_min_count() -> usize {
    3
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            max_depth_km: default_max_depth(),
            moho_km: default_moho(),
            conrad_km: default_conrad(),
            default_depth_km: default_depth(),
            max_shallow_depth_error: default_max_shallow_error(),
            max_deep_depth_error: default_max_deep_error(),
            depth_phase_min_count: default_depth_phase_min_count(),
        }
    }
}

/// Thresholds deciding whether the network can resolve depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthResolutionConfig {
    #[serde(default = "default_min_depth_phases")]
    pub min_depth_phases: usize,
    #[serde(default = "default_min_depth_phase_agencies")]
    pub min_depth_phase_agencies: usize,
    #[serde(default = "default_min_local_stations")]
    pub min_local_stations: usize,
    #[serde(default = "default_local_distance")]
    pub local_distance_deg: f64,
    #[serde(default = "default_min_sp_pairs")]
    pub min_sp_pairs: usize,
    #[serde(default = "default_sp_distance")]
    pub sp_distance_deg: f64,
    #[serde(default = "default_min_core_phases")]
    pub min_core_phases: usize,
}

fn default_min_depth_phases() -> usize {
    5
}
fn default_min_depth_phase_agencies() -> usize {
    2
}
fn default_min_local_stations() -> usize {
    1
}
fn default_local_distance() -> f64 {
    0.2
}
fn default_min_sp_pairs() -> usize {
    5
}
fn default_sp_distance() -> f64 {
    3.0
}
fn default_min_core_phases() -> usize {
    5
}

impl Default for DepthResolutionConfig {
    fn default() -> Self {
        Self {
            min_depth_phases: default_min_depth_phases(),
            min_depth_phase_agencies: default_min_depth_phase_agencies(),
            min_local_stations: default_min_local_stations(),
            local_distance_deg: default_local_distance(),
            min_sp_pairs: default_min_sp_pairs(),
            sp_distance_deg: default_sp_distance(),
            min_core_phases: default_min_core_phases(),
        }
    }
}

/// A priori measurement error of a phase within a distance band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseWeight {
    pub phase: String,
    pub delta_min: f64,
    pub delta_max: f64,
    pub error: f64,
}

impl PhaseWeight {
    fn new(phase: &str, delta_min: f64, delta_max: f64, error: f64) -> Self {
        Self {
            phase: phase.to_string(),
            delta_min,
            delta_max,
            error,
        }
    }
}

/// Phase naming and weighting tables used by phase identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Names a first-arriving P may take.
    #[serde(default = "default_first_p")]
    pub first_p: Vec<String>,
    #[serde(default = "default_optional_first_p")]
    pub optional_first_p: Vec<String>,
    #[serde(default = "default_first_s")]
    pub first_s: Vec<String>,
    #[serde(default = "default_optional_first_s")]
    pub optional_first_s: Vec<String>,
    /// Standard candidate names for later arrivals.
    #[serde(default = "default_allowable")]
    pub allowable: Vec<String>,
    /// Groups of mutually substitutable multiple reflections.
    #[serde(default = "default_multiplets")]
    pub multiplets: Vec<Vec<String>>,
    #[serde(default = "default_phase_weights")]
    pub weights: Vec<PhaseWeight>,
    /// Same station, same phase, different agency: duplicate below this (s).
    #[serde(default = "default_duplicate_tolerance")]
    pub duplicate_tolerance: f64,
    /// Residuals beyond this leave a phase unidentified (s).
    #[serde(default = "default_outlier_cutoff")]
    pub outlier_cutoff_s: f64,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_first_p() -> Vec<String> {
    strings(&["P", "Pn", "Pb", "Pg", "Pdif", "PKPdf", "PKiKP"])
}
fn default_optional_first_p() -> Vec<String> {
    strings(&["PKPab", "PKPbc"])
}
fn default_first_s() -> Vec<String> {
    strings(&["S", "Sn", "Sb", "Sg", "Sdif", "SKSac", "SKSdf"])
}
fn default_optional_first_s() -> Vec<String> {
    strings(&["Lg"])
}
fn default_allowable() -> Vec<String> {
    strings(&[
        "P", "Pn", "Pb", "Pg", "Pdif", "PKPdf", "PKPab", "PKPbc", "PKiKP", "PcP", "pP", "pwP",
        "sP", "PP", "PnPn", "PbPb", "PgPg", "S", "Sn", "Sb", "Sg", "Sdif", "SKSac", "SKSdf", "ScS",
        "sS", "pS", "SS", "SnSn", "SbSb", "SgSg", "Lg",
    ])
}
fn default_multiplets() -> Vec<Vec<String>> {
    vec![
        strings(&["PnPn", "PbPb", "PgPg"]),
        strings(&["SnSn", "SbSb", "SgSg"]),
    ]
}
fn default_phase_weights() -> Vec<PhaseWeight> {
    vec![
        PhaseWeight::new("Pg", 0.0, 10.0, 1.0),
        PhaseWeight::new("Pb", 0.0, 10.0, 1.0),
        PhaseWeight::new("Pn", 0.0, 22.0, 1.0),
        PhaseWeight::new("P", 0.0, 22.0, 1.2),
        PhaseWeight::new("P", 22.0, 100.0, 0.8),
        PhaseWeight::new("Pdif", 100.0, 180.0, 1.5),
        PhaseWeight::new("PKPdf", 110.0, 180.0, 1.3),
        PhaseWeight::new("PKPab", 140.0, 180.0, 1.3),
        PhaseWeight::new("PKPbc", 140.0, 160.0, 1.3),
        PhaseWeight::new("PKiKP", 0.0, 180.0, 1.5),
        PhaseWeight::new("PcP", 0.0, 90.0, 1.3),
        PhaseWeight::new("pP", 20.0, 100.0, 1.3),
        PhaseWeight::new("pwP", 20.0, 100.0, 1.5),
        PhaseWeight::new("sP", 20.0, 100.0, 1.5),
        PhaseWeight::new("PP", 20.0, 180.0, 1.8),
        PhaseWeight::new("Sg", 0.0, 10.0, 1.5),
        PhaseWeight::new("Sb", 0.0, 10.0, 1.5),
        PhaseWeight::new("Sn", 0.0, 22.0, 1.8),
        PhaseWeight::new("S", 0.0, 22.0, 2.0),
        PhaseWeight::new("S", 22.0, 100.0, 1.8),
        PhaseWeight::new("Sdif", 100.0, 180.0, 2.5),
        PhaseWeight::new("SKSac", 60.0, 140.0, 2.0),
        PhaseWeight::new("ScS", 0.0, 90.0, 2.0),
        PhaseWeight::new("sS", 20.0, 100.0, 2.0),
        PhaseWeight::new("pS", 20.0, 100.0, 2.0),
        PhaseWeight::new("SS", 20.0, 180.0, 2.5),
        PhaseWeight::new("Lg", 0.0, 20.0, 2.0),
    ]
}
fn default_duplicate_tolerance() -> f64 {
    0.1
}
fn default_outlier_cutoff() -> f64 {
    60.0
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            first_p: default_first_p(),
            optional_first_p: default_optional_first_p(),
            first_s: default_first_s(),
            optional_first_s: default_optional_first_s(),
            allowable: default_allowable(),
            multiplets: default_multiplets(),
            weights: default_phase_weights(),
            duplicate_tolerance: default_duplicate_tolerance(),
            outlier_cutoff_s: default_outlier_cutoff(),
        }
    }
}

impl PhaseConfig {
    /// A priori measurement error for `phase` at `delta` degrees, if the
    /// phase is weighted in that distance band.
    pub fn measurement_error(&self, phase: &str, delta: f64) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.phase == phase && delta >= w.delta_min && delta < w.delta_max)
            .map(|w| w.error)
    }

    /// Multiplet group containing `phase`, if any.
    pub fn multiplet_of(&self, phase: &str) -> Option<&[String]> {
        self.multiplets
            .iter()
            .find(|group| group.iter().any(|p| p == phase))
            .map(|group| group.as_slice())
    }

    pub fn is_first_p(&self, phase: &str, allow_optional: bool) -> bool {
        self.first_p.iter().any(|p| p == phase)
            || (allow_optional && self.optional_first_p.iter().any(|p| p == phase))
    }

    pub fn is_first_s(&self, phase: &str, allow_optional: bool) -> bool {
        self.first_s.iter().any(|p| p == phase)
            || (allow_optional && self.optional_first_s.iter().any(|p| p == phase))
    }
}

impl LocatorConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> LocatorResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LocatorResult<()> {
        let it = &self.iteration;
        if it.max_iterations < 2 {
            return Err(LocatorError::ConfigError(
                "iteration.max_iterations must be >= 2".to_string(),
            ));
        }
        if it.min_iterations == 0 || it.min_iterations > it.max_iterations {
            return Err(LocatorError::ConfigError(
                "iteration.min_iterations must be in [1, max_iterations]".to_string(),
            ));
        }
        if it.min_ndef_phases == 0 {
            return Err(LocatorError::ConfigError(
                "iteration.min_ndef_phases must be >= 1".to_string(),
            ));
        }
        if !it.sigma_threshold.is_finite() || it.sigma_threshold <= 0.0 {
            return Err(LocatorError::ConfigError(
                "iteration.sigma_threshold must be finite and > 0".to_string(),
            ));
        }
        if ![90.0, 95.0, 99.0].contains(&it.confidence_level) {
            return Err(LocatorError::ConfigError(
                "iteration.confidence_level must be one of 90, 95, 99".to_string(),
            ));
        }
        if !it.convergence_tolerance.is_finite() || it.convergence_tolerance <= 0.0 {
            return Err(LocatorError::ConfigError(
                "iteration.convergence_tolerance must be finite and > 0".to_string(),
            ));
        }
        let pct = self.correlation.variance_explained_percent;
        if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
            return Err(LocatorError::ConfigError(
                "correlation.variance_explained_percent must be in (0, 100]".to_string(),
            ));
        }
        let d = &self.depth;
        if !d.max_depth_km.is_finite() || d.max_depth_km <= 0.0 {
            return Err(LocatorError::ConfigError(
                "depth.max_depth_km must be finite and > 0".to_string(),
            ));
        }
        if !(0.0..=d.max_depth_km).contains(&d.default_depth_km) {
            return Err(LocatorError::ConfigError(
                "depth.default_depth_km must be in [0, max_depth_km]".to_string(),
            ));
        }
        if d.conrad_km > d.moho_km {
            return Err(LocatorError::ConfigError(
                "depth.conrad_km must not exceed depth.moho_km".to_string(),
            ));
        }
        if self.phases.outlier_cutoff_s <= 0.0 || self.phases.duplicate_tolerance < 0.0 {
            return Err(LocatorError::ConfigError(
                "phases.outlier_cutoff_s must be > 0 and phases.duplicate_tolerance >= 0"
                    .to_string(),
            ));
        }
        if let Some(w) = self
            .phases
            .weights
            .iter()
            .find(|w| w.error <= 0.0 || w.delta_max <= w.delta_min)
        {
            return Err(LocatorError::ConfigError(format!(
                "phases.weights entry for {} has an empty band or non-positive error",
                w.phase
            )));
        }
        Ok(())
    }
}
