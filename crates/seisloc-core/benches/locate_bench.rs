// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Location Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use seisloc_core::locate_event;
use seisloc_types::config::LocatorConfig;
use seisloc_types::state::{index_readings, FixedParameters, Solution};
use std::hint::black_box;

#[path = "../tests/common/mod.rs"]
mod common;

use common::*;

fn distances(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.05 + 3.0 * i as f64 / n as f64).collect()
}

fn bench_locate(c: &mut Criterion) {
    let model = HalfSpace::default();
    let variogram = variogram();
    let services = services(&model, &variogram);
    let mut group = c.benchmark_group("locate_event");
    group.sample_size(20);
    for (label, correlated) in [("independent", false), ("correlated", true)] {
        let mut config = LocatorConfig::default();
        config.correlation.do_correlated_errors = correlated;
        for n in [20usize, 80] {
            let d = distances(n);
            let stations = stations_around(&TRUTH, &d);
            let mut phases = noiseless_phases(&model, &TRUTH, &stations, true);
            let readings = index_readings(&mut phases);
            group.bench_function(format!("{label}_{n}_stations"), |b| {
                b.iter(|| {
                    let mut working = phases.clone();
                    let mut solution = Solution::new(SEED, FixedParameters::NONE);
                    let out = locate_event(
                        &config,
                        &services,
                        &stations,
                        &mut working,
                        &readings,
                        &mut solution,
                    );
                    black_box((out.is_ok(), solution.hypocentre))
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_locate);
criterion_main!(benches);
