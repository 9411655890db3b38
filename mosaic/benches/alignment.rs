//! Benchmark for phase correlation and layout solving.

use criterion::{criterion_group, criterion_main, Criterion};

fn benchmarks(c: &mut Criterion) {
    mosaic::bench::benchmarks(c);
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
