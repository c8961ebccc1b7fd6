// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Phase Identification
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Map reported phase labels to standard names against a trial
//! hypocentre, then weight them.
//!
//! Readings are independent; each one is identified on its own slice of
//! the phase array, in parallel when enabled. Candidate lists are built
//! per phase from the immutable configuration, so nothing is shared
//! between readings.

use log::debug;
use rayon::prelude::*;
use seisloc_types::config::{LocatorConfig, PhaseConfig};
use seisloc_types::constants::is_depth_phase;
use seisloc_types::state::{Hypocentre, Phase, PhaseFamily, Reading};

use crate::travel_time::{Predictor, TravelTime};

/// Arrivals closer than this within one reading are the same pick (s).
const SAME_PICK_TOLERANCE: f64 = 0.01;

/// Identify every phase and set weights and defining flags.
///
/// Geometry must be current for `hypo`. Returns the number of defining
/// phases.
pub fn identify_phases(
    phases: &mut [Phase],
    readings: &[Reading],
    predictor: &Predictor,
    hypo: &Hypocentre,
    config: &LocatorConfig,
) -> usize {
    let cfg = &config.phases;
    for_each_reading(phases, readings, config.correlation.parallel, |slice| {
        identify_reading(slice, predictor, hypo, cfg)
    });
    assign_weights(phases, config)
}

/// Rerun identification after the travel-time regime may have changed.
/// Returns whether any resolved name changed.
pub fn reidentify_phases(
    phases: &mut [Phase],
    readings: &[Reading],
    predictor: &Predictor,
    hypo: &Hypocentre,
    config: &LocatorConfig,
) -> bool {
    let before: Vec<String> = phases.iter().map(|p| p.phase.clone()).collect();
    identify_phases(phases, readings, predictor, hypo, config);
    let changed = phases.iter().zip(&before).any(|(p, old)| p.phase != *old);
    if changed {
        debug!("reidentification renamed phases at depth {:.1} km", hypo.depth);
    }
    changed
}

/// Run `f` on each reading's slice, through rayon when `parallel`.
fn for_each_reading<F>(phases: &mut [Phase], readings: &[Reading], parallel: bool, f: F)
where
    F: Fn(&mut [Phase]) + Sync + Send,
{
    let mut slices: Vec<&mut [Phase]> = Vec::with_capacity(readings.len());
    let mut rest = phases;
    let mut offset = 0;
    for r in readings {
        let skip = r.start.saturating_sub(offset);
        if skip + r.len > rest.len() {
            break;
        }
        let (_, tail) = rest.split_at_mut(skip);
        let (slice, tail) = tail.split_at_mut(r.len);
        slices.push(slice);
        rest = tail;
        offset = r.start + r.len;
    }
    if parallel {
        slices.into_par_iter().for_each(|s| f(s));
    } else {
        slices.into_iter().for_each(|s| f(s));
    }
}

fn clear_prediction(p: &mut Phase) {
    p.phase.clear();
    p.ttime = None;
    p.residual = None;
    p.bounce_delta = None;
    p.dtdd = 0.0;
    p.dtdh = 0.0;
}

/// Identify the phases of one time-ordered reading.
fn identify_reading(
    reading: &mut [Phase],
    predictor: &Predictor,
    hypo: &Hypocentre,
    cfg: &PhaseConfig,
) {
    let mut used: Vec<String> = Vec::new();
    let mut have_first_p = false;
    let mut have_first_s = false;

    for i in 0..reading.len() {
        reading[i].first_p = false;
        reading[i].first_s = false;
        let Some(obs) = reading[i].arrival_time else {
            clear_prediction(&mut reading[i]);
            continue;
        };

        if i > 0 && !reading[i - 1].phase.is_empty() {
            if let Some(prev) = reading[i - 1].arrival_time {
                if (obs - prev).abs() < SAME_PICK_TOLERANCE {
                    let (head, tail) = reading.split_at_mut(i);
                    let src = &head[i - 1];
                    let dst = &mut tail[0];
                    dst.phase = src.phase.clone();
                    dst.ttime = src.ttime;
                    dst.dtdd = src.dtdd;
                    dst.dtdh = src.dtdh;
                    dst.bounce_delta = src.bounce_delta;
                    dst.residual = src.ttime.map(|t| obs - hypo.origin_time - t);
                    continue;
                }
            }
        }

        let p = &reading[i];
        let fixed = p.phase_fixed;
        let reported = p.reported_phase.as_str();
        let family = PhaseFamily::of(reported);
        let first_p_slot = !have_first_p
            && !is_depth_phase(reported)
            && (family == PhaseFamily::P || (family == PhaseFamily::Other && i == 0));
        let first_s_slot = !have_first_s && !is_depth_phase(reported) && family == PhaseFamily::S;

        let candidates: Vec<&str> = if fixed {
            vec![reported]
        } else if first_p_slot {
            cfg.first_p.iter().chain(&cfg.optional_first_p).map(String::as_str).collect()
        } else if first_s_slot {
            cfg.first_s.iter().chain(&cfg.optional_first_s).map(String::as_str).collect()
        } else {
            later_candidates(reported, family, cfg)
        };

        let mut best: Option<(&str, TravelTime, f64)> = None;
        for name in candidates {
            if used.iter().any(|u| u == name) && !fixed {
                continue;
            }
            let Some(tt) = predictor.predict(name, p, hypo) else {
                continue;
            };
            let res = obs - hypo.origin_time - tt.time;
            if best.map_or(true, |(_, _, r)| res.abs() < r.abs()) {
                best = Some((name, tt, res));
            }
        }

        let best = best.map(|(name, tt, res)| (name.to_string(), tt, res));
        let p = &mut reading[i];
        match best {
            Some((name, tt, res)) if fixed || res.abs() <= cfg.outlier_cutoff_s => {
                if first_p_slot && cfg.is_first_p(&name, true) {
                    p.first_p = true;
                    have_first_p = true;
                } else if first_s_slot && cfg.is_first_s(&name, true) {
                    p.first_s = true;
                    have_first_s = true;
                }
                p.ttime = Some(tt.time);
                p.dtdd = tt.dtdd;
                p.dtdh = tt.dtdh;
                p.bounce_delta = tt.bounce_delta;
                p.residual = Some(res);
                used.push(name.clone());
                p.phase = name;
            }
            _ => clear_prediction(p),
        }
    }
}

/// Candidates for a phase that is not a first arrival: the allowable
/// list filtered by family, the reported name itself and its multiplet
/// equivalents.
fn later_candidates<'c>(reported: &'c str, family: PhaseFamily, cfg: &'c PhaseConfig) -> Vec<&'c str> {
    let mut names: Vec<&str> = cfg
        .allowable
        .iter()
        .map(String::as_str)
        .filter(|n| family == PhaseFamily::Other || PhaseFamily::of(n) == family)
        .collect();
    if !reported.is_empty() && !names.contains(&reported) {
        names.push(reported);
    }
    if let Some(group) = cfg.multiplet_of(reported) {
        for n in group {
            if !names.contains(&n.as_str()) {
                names.push(n);
            }
        }
    }
    names
}

/// Set a priori errors and defining flags from the weighting table.
/// Returns the number of defining phases.
pub fn assign_weights(phases: &mut [Phase], config: &LocatorConfig) -> usize {
    let sigma = config.iteration.sigma_threshold;
    let mut ndef = 0;
    for p in phases.iter_mut() {
        p.time_defining = false;
        if p.phase.is_empty() || p.duplicate {
            continue;
        }
        let Some(error) = config.phases.measurement_error(&p.phase, p.delta) else {
            p.measurement_error = 0.0;
            continue;
        };
        p.measurement_error = error;
        if p.force_undefining {
            continue;
        }
        if let Some(r) = p.residual {
            if r.abs() <= sigma * error {
                p.time_defining = true;
                ndef += 1;
            }
        }
    }
    ndef
}

/// Flag copies of the same station/phase reported by different readings
/// within `tolerance` seconds. The copy from the lowest reading id
/// survives.
/// Returns the number of duplicates.
pub fn mark_duplicates(phases: &mut [Phase], tolerance: f64) -> usize {
    for p in phases.iter_mut() {
        p.duplicate = false;
    }
    let mut idx: Vec<usize> = (0..phases.len())
        .filter(|&i| !phases[i].phase.is_empty() && phases[i].arrival_time.is_some())
        .collect();
    idx.sort_by(|&a, &b| {
        let (pa, pb) = (&phases[a], &phases[b]);
        pa.station
            .cmp(&pb.station)
            .then_with(|| pa.phase.cmp(&pb.phase))
            .then_with(|| pa.reading_id.cmp(&pb.reading_id))
    });
    let mut count = 0;
    for (k, &i) in idx.iter().enumerate() {
        let pi = &phases[i];
        let ti = pi.arrival_time.unwrap_or(f64::NAN);
        let is_dup = idx[..k].iter().rev().take_while(|&&j| {
            phases[j].station == pi.station && phases[j].phase == pi.phase
        }).any(|&j| {
            let pj = &phases[j];
            pj.reading_id != pi.reading_id
                && !pj.duplicate
                && pj.arrival_time.map_or(false, |tj| (ti - tj).abs() <= tolerance)
        });
        if is_dup {
            let p = &mut phases[i];
            p.duplicate = true;
            p.time_defining = false;
            count += 1;
        }
    }
    count
}
