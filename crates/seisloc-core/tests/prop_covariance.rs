// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Property-Based Tests (proptest) for the data covariance
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Block structure of the covariance and projection matrices over
//! random station layouts and phase mixes.

use proptest::prelude::*;
use seisloc_core::covariance::{CovarianceUpdate, DataCovariance, Variogram};
use seisloc_core::stations::{SingleLinkageOrdering, StationNetwork};
use seisloc_types::config::CorrelationConfig;
use seisloc_types::state::{Phase, Station};

const NAMES: [&str; 3] = ["P", "Pn", "S"];

#[derive(Debug, Clone)]
struct Layout {
    stations: Vec<Station>,
    phases: Vec<Phase>,
}

fn layout() -> impl Strategy<Value = Layout> {
    // one pick per station; a priori variance above any sill keeps C positive definite
    let pick = (-1.0f64..1.0, -1.0f64..1.0, 0usize..3, 1.0f64..2.5);
    prop::collection::vec(pick, 2..30).prop_map(|picks| {
        let mut stations = Vec::with_capacity(picks.len());
        let mut phases = Vec::with_capacity(picks.len());
        for (k, &(lat, lon, name, error)) in picks.iter().enumerate() {
            stations.push(Station::new(&format!("S{k}"), lat, lon));
            let mut p = Phase::new(k as u64, k as u64, "A", k, NAMES[name], 0.0);
            p.phase = NAMES[name].to_string();
            p.measurement_error = error;
            p.time_defining = true;
            phases.push(p);
        }
        Layout { stations, phases }
    })
}

fn build(l: &Layout, sill: f64, range: f64) -> (StationNetwork, DataCovariance, Variogram) {
    let net = StationNetwork::build(&l.phases, &l.stations, &SingleLinkageOrdering);
    let variogram = Variogram::exponential(sill, range);
    let config = CorrelationConfig {
        parallel: false,
        ..CorrelationConfig::default()
    };
    let cov = DataCovariance::build(&l.phases, &net, &variogram, &config);
    (net, cov, variogram)
}

proptest! {
    /// Entries between different phase names are exactly zero and the
    /// diagonal is the a priori variance.
    #[test]
    fn cross_phase_entries_vanish(l in layout(), sill in 0.1f64..0.9, range in 10.0f64..200.0) {
        let (_, cov, _) = build(&l, sill, range);
        let c = cov.matrix();
        let members = cov.members();
        prop_assert_eq!(members.len(), l.phases.len());
        for (a, &i) in members.iter().enumerate() {
            let pi = &l.phases[i];
            prop_assert_eq!(c[[a, a]], pi.measurement_error * pi.measurement_error);
            for (b, &j) in members.iter().enumerate() {
                prop_assert_eq!(c[[a, b]], c[[b, a]]);
                if pi.phase != l.phases[j].phase {
                    prop_assert_eq!(c[[a, b]], 0.0);
                }
            }
        }
    }

    /// The projection never mixes phase groups and keeps at least one
    /// component per group.
    #[test]
    fn projection_is_block_diagonal(l in layout(), sill in 0.1f64..0.9, range in 10.0f64..200.0) {
        let (_, cov, _) = build(&l, sill, range);
        let w = cov.projection_matrix();
        let names: Vec<&str> = cov.members().iter().map(|&i| l.phases[i].phase.as_str()).collect();
        for a in 0..names.len() {
            for b in 0..names.len() {
                if names[a] != names[b] {
                    prop_assert_eq!(w[[a, b]], 0.0);
                }
            }
        }
        prop_assert!(cov.rank() <= cov.len());
        prop_assert!(cov.rank() >= cov.groups().len());
    }

    /// Rebuilding against an unchanged defining set is a no-op.
    #[test]
    fn update_without_change_is_noop(l in layout()) {
        let (net, mut cov, variogram) = build(&l, 0.5, 80.0);
        let before = cov.matrix().clone();
        prop_assert_eq!(cov.update(&l.phases, &net, &variogram), CovarianceUpdate::Unchanged);
        prop_assert_eq!(cov.matrix(), &before);
    }
}
