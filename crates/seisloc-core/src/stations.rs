// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Station Network
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Stations of the defining set, their separation matrix and a
//! nearest-neighbour order that keeps correlated stations adjacent.

use std::collections::BTreeSet;

use ndarray::Array2;
use seisloc_math::geodesy::delaz;
use seisloc_types::constants::DEG2KM;
use seisloc_types::state::{Phase, Station};

/// Linear station order from a separation matrix.
pub trait StationOrdering: Sync {
    /// Permutation of `0..n`: position `k` holds the local index of the
    /// `k`-th station in order.
    fn order(&self, distances: &Array2<f64>) -> Vec<usize>;
}

/// Agglomerative single-linkage clustering; leaves are emitted in
/// dendrogram order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleLinkageOrdering;

impl StationOrdering for SingleLinkageOrdering {
    fn order(&self, distances: &Array2<f64>) -> Vec<usize> {
        let n = distances.nrows();
        let mut clusters: Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
        let mut link = distances.clone();
        for _ in 1..n {
            let mut best: Option<(usize, usize, f64)> = None;
            for a in 0..n {
                if clusters[a].is_none() {
                    continue;
                }
                for b in (a + 1)..n {
                    if clusters[b].is_none() {
                        continue;
                    }
                    let d = link[[a, b]];
                    if best.map_or(true, |(_, _, bd)| d < bd) {
                        best = Some((a, b, d));
                    }
                }
            }
            let Some((a, b, _)) = best else { break };
            let merged_b = clusters[b].take().unwrap_or_default();
            if let Some(members) = clusters[a].as_mut() {
                members.extend(merged_b);
            }
            for k in 0..n {
                let d = link[[a, k]].min(link[[b, k]]);
                link[[a, k]] = d;
                link[[k, a]] = d;
            }
        }
        clusters.into_iter().flatten().flatten().collect()
    }
}

/// Stations referenced by the defining set, with separations in km.
#[derive(Debug, Clone)]
pub struct StationNetwork {
    /// Event station index of each local station.
    stations: Vec<usize>,
    /// Local station index of each event station, if present.
    local: Vec<Option<usize>>,
    /// km
    distances: Array2<f64>,
    /// Position in nearest-neighbour order of each local station.
    rank: Vec<usize>,
}

impl StationNetwork {
    pub fn build(phases: &[Phase], stations: &[Station], ordering: &dyn StationOrdering) -> Self {
        let used: BTreeSet<usize> = phases
            .iter()
            .filter(|p| p.time_defining && p.station < stations.len())
            .map(|p| p.station)
            .collect();
        let members: Vec<usize> = used.into_iter().collect();
        let n = members.len();
        let mut distances = Array2::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&stations[members[i]], &stations[members[j]]);
                let (delta, _, _) = delaz(a.lat, a.lon, b.lat, b.lon);
                distances[[i, j]] = delta * DEG2KM;
                distances[[j, i]] = delta * DEG2KM;
            }
        }
        let order = ordering.order(&distances);
        let mut rank = vec![0; n];
        for (pos, &i) in order.iter().enumerate() {
            if i < n {
                rank[i] = pos;
            }
        }
        let mut local = vec![None; stations.len()];
        for (i, &s) in members.iter().enumerate() {
            local[s] = Some(i);
        }
        Self {
            stations: members,
            local,
            distances,
            rank,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Does the network hold every station of the defining set?
    pub fn covers(&self, phases: &[Phase]) -> bool {
        phases
            .iter()
            .filter(|p| p.time_defining)
            .all(|p| self.local.get(p.station).copied().flatten().is_some())
    }

    /// Separation (km) of two event stations; `None` if either is absent.
    pub fn distance_km(&self, a: usize, b: usize) -> Option<f64> {
        let i = self.local.get(a).copied().flatten()?;
        let j = self.local.get(b).copied().flatten()?;
        Some(self.distances[[i, j]])
    }

    /// Position of an event station in nearest-neighbour order.
    pub fn rank(&self, station: usize) -> Option<usize> {
        let i = self.local.get(station).copied().flatten()?;
        Some(self.rank[i])
    }
}
