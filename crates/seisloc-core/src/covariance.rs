// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Data Covariance and Projection
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Empirical data covariance of the defining phases and the whitening
//! ("projection") matrix derived from it.
//!
//! Defining phases are ordered by phase name, then by nearest-neighbour
//! station rank. Different phase names are uncorrelated, so the matrix is
//! block diagonal by name; within a name group it splits further into
//! blocks of mutually correlated stations. Each block is eigendecomposed
//! on its own and contributes `diag(1/√λ)·Vᵗ` rows for the components
//! it keeps.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use seisloc_math::interp::bracket;
use seisloc_math::linalg::symmetric_eigen;
use seisloc_types::config::CorrelationConfig;
use seisloc_types::error::{LocatorError, LocatorResult};
use seisloc_types::state::Phase;

use crate::stations::StationNetwork;

/// Station-separation variogram γ(h) with a sill. Covariance at
/// separation `h` is `sill − γ(h)`, zero beyond the last sample.
#[derive(Debug, Clone)]
pub struct Variogram {
    separations: Vec<f64>,
    gamma: Vec<f64>,
    sill: f64,
}

impl Variogram {
    /// Sampled variogram; separations in km, strictly increasing.
    pub fn new(separations: Vec<f64>, gamma: Vec<f64>, sill: f64) -> LocatorResult<Self> {
        if separations.len() < 2 || separations.len() != gamma.len() {
            return Err(LocatorError::ConfigError(
                "variogram needs at least two (separation, gamma) samples".to_string(),
            ));
        }
        if separations.windows(2).any(|w| w[1] <= w[0]) {
            return Err(LocatorError::ConfigError(
                "variogram separations must be strictly increasing".to_string(),
            ));
        }
        if !sill.is_finite() || sill < 0.0 {
            return Err(LocatorError::ConfigError(
                "variogram sill must be finite and >= 0".to_string(),
            ));
        }
        Ok(Self {
            separations,
            gamma,
            sill,
        })
    }

    /// Exponential model `γ(h) = sill·(1 − exp(−3h/range))` sampled out
    /// to three ranges.
    pub fn exponential(sill: f64, range_km: f64) -> Self {
        let range_km = range_km.max(f64::MIN_POSITIVE);
        let n = 61;
        let separations: Vec<f64> = (0..n).map(|i| 3.0 * range_km * i as f64 / (n - 1) as f64).collect();
        let gamma = separations
            .iter()
            .map(|h| sill * (1.0 - (-3.0 * h / range_km).exp()))
            .collect();
        Self {
            separations,
            gamma,
            sill,
        }
    }

    pub fn sill(&self) -> f64 {
        self.sill
    }

    pub fn max_separation(&self) -> f64 {
        self.separations[self.separations.len() - 1]
    }

    pub fn covariance(&self, separation_km: f64) -> f64 {
        if separation_km > self.max_separation() {
            return 0.0;
        }
        let (lo, hi) = bracket(&self.separations, separation_km);
        let (x0, x1) = (self.separations[lo], self.separations[hi]);
        let t = if x1 > x0 {
            ((separation_km - x0) / (x1 - x0)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let gamma = self.gamma[lo] + t * (self.gamma[hi] - self.gamma[lo]);
        (self.sill - gamma).max(0.0)
    }
}

/// Contiguous run of one phase name in covariance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseGroup {
    pub name: String,
    pub start: usize,
    pub len: usize,
}

/// Whitening rows of one correlated block; `start` is relative to its
/// phase group.
#[derive(Debug, Clone)]
struct ProjectionBlock {
    start: usize,
    w: Array2<f64>,
    rank: usize,
}

/// What [`DataCovariance::update`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovarianceUpdate {
    Unchanged,
    /// Rows/columns of phases that became non-defining were dropped.
    Pruned { groups: usize },
    /// Same phases under new names; only affected groups re-projected.
    Renamed { groups: usize },
    Rebuilt,
}

#[derive(Debug, Clone)]
pub struct DataCovariance {
    members: Vec<usize>,
    names: Vec<String>,
    matrix: Array2<f64>,
    groups: Vec<PhaseGroup>,
    projections: HashMap<String, Vec<ProjectionBlock>>,
    variance_explained: f64,
    parallel: bool,
}

/// Defining phases in covariance order: name, station rank, arrival id.
fn ordered_members(phases: &[Phase], network: &StationNetwork) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..phases.len()).filter(|&i| phases[i].time_defining).collect();
    idx.sort_by(|&a, &b| {
        let (pa, pb) = (&phases[a], &phases[b]);
        pa.phase
            .cmp(&pb.phase)
            .then_with(|| network.rank(pa.station).cmp(&network.rank(pb.station)))
            .then_with(|| pa.arrival_id.cmp(&pb.arrival_id))
    });
    idx
}

fn phase_groups(names: &[String]) -> Vec<PhaseGroup> {
    let mut groups: Vec<PhaseGroup> = Vec::new();
    for (i, name) in names.iter().enumerate() {
        match groups.last_mut() {
            Some(g) if g.name == *name => g.len += 1,
            _ => groups.push(PhaseGroup {
                name: name.clone(),
                start: i,
                len: 1,
            }),
        }
    }
    groups
}

fn covariance_matrix(
    phases: &[Phase],
    members: &[usize],
    network: &StationNetwork,
    variogram: &Variogram,
) -> Array2<f64> {
    let n = members.len();
    let mut c = Array2::zeros((n, n));
    for i in 0..n {
        let pi = &phases[members[i]];
        c[[i, i]] = pi.measurement_error * pi.measurement_error;
        for j in (i + 1)..n {
            let pj = &phases[members[j]];
            if pi.phase != pj.phase {
                continue;
            }
            let cov = network
                .distance_km(pi.station, pj.station)
                .map_or(0.0, |h| variogram.covariance(h));
            c[[i, j]] = cov;
            c[[j, i]] = cov;
        }
    }
    c
}

/// Split `[start, start + len)` of `c` into maximal correlated blocks.
fn correlated_blocks(c: &Array2<f64>, start: usize, len: usize) -> Vec<(usize, usize)> {
    let end = start + len;
    let mut blocks = Vec::new();
    let mut k = start;
    while k < end {
        let mut last = k;
        let mut r = k;
        while r <= last {
            for col in (last + 1)..end {
                if c[[r, col]] != 0.0 {
                    last = col;
                }
            }
            r += 1;
        }
        blocks.push((k, last + 1 - k));
        k = last + 1;
    }
    blocks
}

/// Whitening rows of one symmetric block keeping `percent` of its
/// variance. Returns `(w, rank)`; rows past `rank` are zero.
fn block_projection(block: &Array2<f64>, percent: f64) -> (Array2<f64>, usize) {
    let n = block.nrows();
    let (values, vectors) = symmetric_eigen(block);
    let norm = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let threshold = f64::EPSILON * n as f64 * norm;
    let total: f64 = values.iter().filter(|&&v| v > threshold).sum();
    let target = 0.01 * percent * total;
    let mut w = Array2::zeros((n, n));
    let mut explained = 0.0;
    let mut rank = 0;
    for (c, &lambda) in values.iter().enumerate() {
        if lambda <= threshold || explained >= target {
            break;
        }
        let scale = 1.0 / lambda.sqrt();
        for r in 0..n {
            w[[rank, r]] = vectors[[r, c]] * scale;
        }
        explained += lambda;
        rank += 1;
    }
    (w, rank)
}

impl DataCovariance {
    pub fn build(
        phases: &[Phase],
        network: &StationNetwork,
        variogram: &Variogram,
        config: &CorrelationConfig,
    ) -> Self {
        let members = ordered_members(phases, network);
        let names: Vec<String> = members.iter().map(|&i| phases[i].phase.clone()).collect();
        let matrix = covariance_matrix(phases, &members, network, variogram);
        let groups = phase_groups(&names);
        let mut cov = Self {
            members,
            names,
            matrix,
            groups,
            projections: HashMap::new(),
            variance_explained: config.variance_explained_percent,
            parallel: config.parallel,
        };
        cov.refresh_projections(None);
        cov
    }

    /// Bring the matrices in line with the current defining set, doing
    /// as little work as the change allows.
    pub fn update(
        &mut self,
        phases: &[Phase],
        network: &StationNetwork,
        variogram: &Variogram,
    ) -> CovarianceUpdate {
        let members = ordered_members(phases, network);
        let names: Vec<String> = members.iter().map(|&i| phases[i].phase.clone()).collect();
        if members == self.members && names == self.names {
            return CovarianceUpdate::Unchanged;
        }
        let old_pos: HashMap<usize, usize> =
            self.members.iter().enumerate().map(|(k, &i)| (i, k)).collect();

        let survivors_unrenamed = members
            .iter()
            .zip(&names)
            .all(|(i, n)| old_pos.get(i).map_or(false, |&k| self.names[k] == *n));
        if members.len() < self.members.len() && survivors_unrenamed {
            let keep: Vec<usize> = members.iter().map(|i| old_pos[i]).collect();
            let kept: BTreeSet<usize> = keep.iter().copied().collect();
            let dirty: BTreeSet<String> = (0..self.members.len())
                .filter(|k| !kept.contains(k))
                .map(|k| self.names[k].clone())
                .collect();
            self.matrix = self.matrix.select(Axis(0), &keep).select(Axis(1), &keep);
            self.install(members, names, Some(&dirty));
            return CovarianceUpdate::Pruned {
                groups: dirty.len(),
            };
        }

        let same_phases = members.len() == self.members.len()
            && members.iter().all(|i| old_pos.contains_key(i));
        if same_phases {
            let mut dirty: BTreeSet<String> = BTreeSet::new();
            for (i, n) in members.iter().zip(&names) {
                let old = &self.names[old_pos[i]];
                if old != n {
                    dirty.insert(old.clone());
                    dirty.insert(n.clone());
                }
            }
            self.matrix = covariance_matrix(phases, &members, network, variogram);
            self.install(members, names, Some(&dirty));
            return CovarianceUpdate::Renamed {
                groups: dirty.len(),
            };
        }

        self.matrix = covariance_matrix(phases, &members, network, variogram);
        self.install(members, names, None);
        CovarianceUpdate::Rebuilt
    }

    fn install(&mut self, members: Vec<usize>, names: Vec<String>, dirty: Option<&BTreeSet<String>>) {
        self.members = members;
        self.names = names;
        self.groups = phase_groups(&self.names);
        if dirty.is_none() {
            self.projections.clear();
        }
        self.refresh_projections(dirty);
    }

    /// Recompute projections of the `dirty` groups (all when `None`),
    /// one task per correlated block.
    fn refresh_projections(&mut self, dirty: Option<&BTreeSet<String>>) {
        let present: BTreeSet<&str> = self.groups.iter().map(|g| g.name.as_str()).collect();
        self.projections.retain(|name, _| present.contains(name.as_str()));

        let mut jobs: Vec<(usize, usize, usize)> = Vec::new();
        for (gi, g) in self.groups.iter().enumerate() {
            let stale = dirty.map_or(true, |d| d.contains(&g.name))
                || !self.projections.contains_key(&g.name);
            if !stale {
                continue;
            }
            for (start, len) in correlated_blocks(&self.matrix, g.start, g.len) {
                jobs.push((gi, start, len));
            }
        }
        if jobs.is_empty() {
            return;
        }

        let matrix = &self.matrix;
        let percent = self.variance_explained;
        let run = |&(gi, start, len): &(usize, usize, usize)| {
            let block = matrix.slice(s![start..start + len, start..start + len]).to_owned();
            let (w, rank) = block_projection(&block, percent);
            (gi, start, w, rank)
        };
        let results: Vec<(usize, usize, Array2<f64>, usize)> = if self.parallel {
            jobs.par_iter().map(run).collect()
        } else {
            jobs.iter().map(run).collect()
        };

        let mut fresh: HashMap<String, Vec<ProjectionBlock>> = HashMap::new();
        for (gi, start, w, rank) in results {
            let g = &self.groups[gi];
            fresh.entry(g.name.clone()).or_default().push(ProjectionBlock {
                start: start - g.start,
                w,
                rank,
            });
        }
        for (name, blocks) in fresh {
            debug!(
                "projection {name}: {} block(s), rank {}",
                blocks.len(),
                blocks.iter().map(|b| b.rank).sum::<usize>()
            );
            self.projections.insert(name, blocks);
        }
    }

    /// Phase indices in covariance (row) order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn groups(&self) -> &[PhaseGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of independent (non-null-space) observations.
    pub fn rank(&self) -> usize {
        self.projections
            .values()
            .flat_map(|blocks| blocks.iter().map(|b| b.rank))
            .sum()
    }

    /// Whitening matrix `W` assembled in full.
    pub fn projection_matrix(&self) -> Array2<f64> {
        let n = self.members.len();
        let mut w = Array2::zeros((n, n));
        for g in &self.groups {
            for b in self.projections.get(&g.name).into_iter().flatten() {
                let lo = g.start + b.start;
                let len = b.w.nrows();
                w.slice_mut(s![lo..lo + len, lo..lo + len]).assign(&b.w);
            }
        }
        w
    }

    fn project_column(&self, col: ArrayView1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(col.len());
        for g in &self.groups {
            for b in self.projections.get(&g.name).into_iter().flatten() {
                let lo = g.start + b.start;
                let len = b.w.nrows();
                let projected = b.w.dot(&col.slice(s![lo..lo + len]));
                out.slice_mut(s![lo..lo + len]).assign(&projected);
            }
        }
        out
    }

    /// `W·A` for `A` with rows in covariance order, one task per column.
    pub fn project(&self, a: &Array2<f64>) -> Array2<f64> {
        let columns: Vec<Array1<f64>> = if self.parallel {
            (0..a.ncols())
                .into_par_iter()
                .map(|j| self.project_column(a.column(j)))
                .collect()
        } else {
            (0..a.ncols()).map(|j| self.project_column(a.column(j))).collect()
        };
        let mut out = Array2::zeros(a.dim());
        for (j, c) in columns.iter().enumerate() {
            out.column_mut(j).assign(c);
        }
        out
    }

    pub fn project_vector(&self, d: &Array1<f64>) -> Array1<f64> {
        self.project_column(d.view())
    }
}
