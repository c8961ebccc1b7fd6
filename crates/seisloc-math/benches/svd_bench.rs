// ─────────────────────────────────────────────────────────────────────
// SeisLoc — SVD Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seisloc_math::linalg::{svd, symmetric_eigen};
use std::hint::black_box;

fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
}

fn bench_svd(c: &mut Criterion) {
    let mut group = c.benchmark_group("svd_design_matrix");
    for rows in [50usize, 200, 1000] {
        let a = random_matrix(rows, 4, 7);
        group.bench_function(format!("{rows}x4"), |b| b.iter(|| black_box(svd(&a))));
    }
    group.finish();
}

fn bench_symmetric_eigen(c: &mut Criterion) {
    let mut group = c.benchmark_group("symmetric_eigen_block");
    group.sample_size(20);
    for n in [10usize, 40, 80] {
        let b = random_matrix(n, n, 11);
        let a = b.dot(&b.t());
        group.bench_function(format!("{n}x{n}"), |bch| {
            bch.iter(|| black_box(symmetric_eigen(&a)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_svd, bench_symmetric_eigen);
criterion_main!(benches);
