// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Depth Resolution
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Does the defining set constrain depth?
//!
//! [`check_depth_phases`] mutates (pairs depth phases with their
//! reading's first P and drops orphans); [`depth_resolution`] only
//! queries.

use std::collections::BTreeSet;

use seisloc_types::config::DepthResolutionConfig;
use seisloc_types::constants::{is_depth_phase, CORE_REFLECTIONS};
use seisloc_types::state::{Phase, Reading};

/// Counts behind a depth-resolution decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthResolution {
    pub resolved: bool,
    pub depth_phases: usize,
    pub depth_phase_agencies: usize,
    pub local_stations: usize,
    pub sp_pairs: usize,
    pub core_phases: usize,
    pub core_phase_agencies: usize,
}

/// Pair every depth phase with the defining first-arriving P of its
/// reading. Depth phases without one become non-defining.
///
/// Returns the number of defining depth phases left.
pub fn check_depth_phases(phases: &mut [Phase], readings: &[Reading]) -> usize {
    let mut ndp = 0;
    for r in readings {
        let range = r.range();
        if range.end > phases.len() {
            continue;
        }
        let first_p = range
            .clone()
            .find(|&i| phases[i].first_p && phases[i].time_defining);
        for i in range {
            let p = &mut phases[i];
            if !is_depth_phase(&p.phase) {
                p.first_p_index = None;
                continue;
            }
            p.first_p_index = first_p;
            match first_p {
                Some(_) if p.time_defining => ndp += 1,
                Some(_) => {}
                None => p.time_defining = false,
            }
        }
    }
    ndp
}

/// Evaluate the depth-resolution criteria. Every threshold is inclusive.
pub fn depth_resolution(
    phases: &[Phase],
    readings: &[Reading],
    config: &DepthResolutionConfig,
) -> DepthResolution {
    let mut depth_agencies: BTreeSet<&str> = BTreeSet::new();
    let mut core_agencies: BTreeSet<&str> = BTreeSet::new();
    let mut local: BTreeSet<usize> = BTreeSet::new();
    let mut sp: BTreeSet<usize> = BTreeSet::new();
    let mut res = DepthResolution::default();

    for p in phases.iter().filter(|p| p.time_defining) {
        if is_depth_phase(&p.phase) && p.first_p_index.is_some() {
            res.depth_phases += 1;
            depth_agencies.insert(p.agency.as_str());
        }
        if CORE_REFLECTIONS.contains(&p.phase.as_str()) {
            res.core_phases += 1;
            core_agencies.insert(p.agency.as_str());
        }
        if p.delta <= config.local_distance_deg {
            local.insert(p.station);
        }
    }

    for r in readings {
        let range = r.range();
        if range.end > phases.len() {
            continue;
        }
        let slice = &phases[range];
        let first_p = slice.iter().find(|p| p.first_p && p.time_defining);
        let first_s = slice.iter().find(|p| p.first_s && p.time_defining);
        if let (Some(fp), Some(_)) = (first_p, first_s) {
            if fp.delta <= config.sp_distance_deg {
                sp.insert(fp.station);
            }
        }
    }

    res.depth_phase_agencies = depth_agencies.len();
    res.core_phase_agencies = core_agencies.len();
    res.local_stations = local.len();
    res.sp_pairs = sp.len();
    res.resolved = (res.depth_phases >= config.min_depth_phases
        && res.depth_phase_agencies >= config.min_depth_phase_agencies)
        || res.local_stations >= config.min_local_stations
        || res.sp_pairs >= config.min_sp_pairs
        || (res.core_phases >= config.min_core_phases
            && res.core_phase_agencies >= config.min_depth_phase_agencies);
    res
}
