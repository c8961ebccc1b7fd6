// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Depth-Phase Stacking
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Depth from depth-phase moveouts (Murphy & Barker, 2006).
//!
//! Each reading with a defining first P and a depth phase contributes a
//! boxcar over the depths whose predicted moveout matches the observed
//! one within its timing error. The network stack is summed in 1 km bins;
//! the depth is the median of the stack around its mode.

use log::debug;
use seisloc_math::geodesy::point_at;
use seisloc_math::interp::{CubicSpline, MIN_SAMPLES};
use seisloc_math::stats::{histogram_median, weighted_scaled_mad};
use seisloc_types::config::DepthConfig;
use seisloc_types::constants::{is_depth_phase, DEG2KM, VP_SURFACE, VS_SURFACE, V_WATER};
use seisloc_types::state::{DepthPhaseEstimate, Hypocentre, Phase, Reading};

use crate::travel_time::{TableModel, Topography};

/// Width of a stack bin (km).
pub const DEPTH_BIN_KM: f64 = 1.0;

/// Timing error of a depth phase that carries no a priori error (s).
const DEFAULT_MOVEOUT_ERROR: f64 = 1.0;

/// Extra travel time (s) of a depth phase reflecting at a surface of
/// `elevation` km, for ray parameter `p` in s/km.
///
/// Negative elevation is a sea floor; for pwP the water column is added.
pub fn bounce_correction(phase: &str, elevation: f64, p: f64) -> f64 {
    let eta = |v: f64| (1.0 / (v * v) - p * p).max(0.0).sqrt();
    let eta_p = eta(VP_SURFACE);
    let eta_s = eta(VS_SURFACE);
    match phase {
        "pP" => 2.0 * elevation * eta_p,
        "pwP" => 2.0 * elevation * eta_p + 2.0 * (-elevation).max(0.0) * eta(V_WATER),
        "sP" | "pS" => elevation * (eta_p + eta_s),
        "sS" => 2.0 * elevation * eta_s,
        _ => 0.0,
    }
}

/// Predicted moveout curve (depth km, moveout s) of `depth_phase` behind
/// `first_p`, on the depth phase table's depth nodes.
fn moveout_curve(
    tables: &TableModel,
    topography: &dyn Topography,
    hypo: &Hypocentre,
    first_p: &Phase,
    depth_phase: &str,
) -> Option<CubicSpline> {
    let ptable = tables.table(&first_p.phase)?;
    let dtable = tables.table(depth_phase)?;
    let delta = first_p.delta;
    let mut z = Vec::with_capacity(dtable.depths.len());
    let mut m = Vec::with_capacity(dtable.depths.len());
    for (k, &depth) in dtable.depths.iter().enumerate() {
        let Some((t_dp, dtdd)) = dtable.at_depth_index(delta, k) else {
            continue;
        };
        let Some(tp) = ptable.predict(delta, depth) else {
            continue;
        };
        let bounce = dtable
            .predict(delta, depth)
            .and_then(|tt| tt.bounce_delta)
            .unwrap_or(0.0);
        let (blat, blon) = point_at(hypo.lat, hypo.lon, bounce, first_p.esaz);
        let elevation = topography.elevation(blat, blon);
        m.push(t_dp + bounce_correction(depth_phase, elevation, dtdd / DEG2KM) - tp.time);
        z.push(depth);
    }
    if z.len() < MIN_SAMPLES {
        return None;
    }
    CubicSpline::new(&z, &m)
}

/// Stack depth-phase traces of all readings and estimate depth.
///
/// Geometry of `phases` must be current for `hypo`. Returns
/// [`DepthPhaseEstimate::unresolved`] without enough support.
pub fn depth_phase_stack(
    phases: &[Phase],
    readings: &[Reading],
    hypo: &Hypocentre,
    tables: &TableModel,
    topography: &dyn Topography,
    config: &DepthConfig,
) -> DepthPhaseEstimate {
    let nbins = (config.max_depth_km / DEPTH_BIN_KM).floor() as usize + 1;
    let mut stack = vec![0.0; nbins];
    let mut contributing = 0usize;

    for r in readings {
        let range = r.range();
        if range.end > phases.len() {
            continue;
        }
        let slice = &phases[range];
        let Some(first_p) = slice
            .iter()
            .find(|p| p.first_p && p.time_defining && p.arrival_time.is_some())
        else {
            continue;
        };
        let tp_obs = first_p.arrival_time.unwrap_or_default();
        for dp in slice
            .iter()
            .filter(|p| is_depth_phase(&p.phase) && !p.duplicate)
        {
            let Some(t_obs) = dp.arrival_time else { continue };
            let Some(curve) = moveout_curve(tables, topography, hypo, first_p, &dp.phase) else {
                continue;
            };
            let observed = t_obs - tp_obs;
            let tolerance = if dp.measurement_error > 0.0 {
                dp.measurement_error
            } else {
                DEFAULT_MOVEOUT_ERROR
            };
            let (zmin, zmax) = curve.x_range();
            let mut hit = false;
            for (b, cell) in stack.iter_mut().enumerate() {
                let z = b as f64 * DEPTH_BIN_KM;
                if z < zmin || z > zmax {
                    continue;
                }
                if (curve.eval(z) - observed).abs() <= tolerance {
                    *cell += 1.0;
                    hit = true;
                }
            }
            if hit {
                contributing += 1;
            }
        }
    }

    match stack_statistics(&stack, config.depth_phase_min_count) {
        Some((depth, error)) => {
            debug!("depth-phase stack: {depth:.1} ± {error:.1} km from {contributing} phases");
            DepthPhaseEstimate {
                depth,
                error,
                count: contributing,
            }
        }
        None => DepthPhaseEstimate::unresolved(),
    }
}

/// Median depth and 1.4826·MAD of a depth stack, over the contiguous
/// nonzero support around its mode.
///
/// `None` when the mode holds fewer than `min_count` traces.
pub fn stack_statistics(stack: &[f64], min_count: usize) -> Option<(f64, f64)> {
    let (mode, &peak) = stack
        .iter()
        .enumerate()
        .reduce(|best, cur| if cur.1 > best.1 { cur } else { best })?;
    if peak <= 0.0 || peak < min_count as f64 {
        return None;
    }
    let mut lo = mode;
    while lo > 0 && stack[lo - 1] > 0.0 {
        lo -= 1;
    }
    let mut hi = mode;
    while hi + 1 < stack.len() && stack[hi + 1] > 0.0 {
        hi += 1;
    }
    let depths: Vec<f64> = (lo..=hi).map(|b| b as f64 * DEPTH_BIN_KM).collect();
    let weights = &stack[lo..=hi];
    let median = histogram_median(&depths, weights)?;
    let error = weighted_scaled_mad(&depths, weights, median)?;
    Some((median, error))
}
