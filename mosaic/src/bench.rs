//! Benchmarks for alignment and layout solving.
//! Run with: cargo bench -p mosaic --features bench --bench alignment

use std::collections::BTreeMap;
use std::hint::black_box;

use common::Buffer2;
use criterion::{BenchmarkId, Criterion, Throughput};
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::alignment::{align_regions, PhaseCorrelator};
use crate::config::{PhaseCorrelationConfig, RelaxConfig, SubpixelMethod};
use crate::layout::{highest_weight_first, relax_layout, LayoutEdge, LayoutGraph};
use crate::tile::TileId;

/// Register all mosaic benchmarks with Criterion.
pub fn benchmarks(c: &mut Criterion) {
    benchmark_correlation_sizes(c);
    benchmark_subpixel_methods(c);
    benchmark_solvers(c);
}

/// Region of random Gaussian spots, sampled with its origin at `origin`.
fn generate_region(width: usize, height: usize, origin: DVec2) -> Buffer2<f32> {
    let mut rng = StdRng::seed_from_u64(11);
    let extent = DVec2::new(width as f64, height as f64) + 32.0;
    let spots: Vec<DVec2> = (0..(width * height) / 64)
        .map(|_| {
            DVec2::new(
                rng.random_range(-16.0..extent.x),
                rng.random_range(-16.0..extent.y),
            )
        })
        .collect();

    Buffer2::from_fn(width, height, |x, y| {
        let p = origin + DVec2::new(x as f64, y as f64);
        spots
            .iter()
            .map(|s| (-(p - *s).length_squared() / 8.0).exp())
            .sum::<f64>() as f32
    })
}

fn benchmark_correlation_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("align_regions");
    let config = PhaseCorrelationConfig::default();

    for (width, height) in [(48, 256), (96, 512), (192, 1024)] {
        let a = generate_region(width, height, DVec2::ZERO);
        let b = generate_region(width, height, DVec2::new(3.0, -2.0));

        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_function(BenchmarkId::new("strip", format!("{width}x{height}")), |bench| {
            bench.iter(|| {
                let result = align_regions(black_box(&a), black_box(&b), DVec2::ZERO, &config);
                black_box(result)
            })
        });
    }

    group.finish();
}

fn benchmark_subpixel_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("subpixel_methods");
    let a = generate_region(128, 128, DVec2::ZERO);
    let b = generate_region(128, 128, DVec2::new(2.4, 1.7));

    for subpixel in [
        SubpixelMethod::None,
        SubpixelMethod::Parabolic,
        SubpixelMethod::Gaussian,
        SubpixelMethod::Centroid,
    ] {
        let config = PhaseCorrelationConfig {
            subpixel,
            ..PhaseCorrelationConfig::default()
        };
        let correlator = PhaseCorrelator::new(128, 128, config);
        group.bench_function(BenchmarkId::new("correlate", format!("{subpixel:?}")), |bench| {
            bench.iter(|| black_box(correlator.correlate(black_box(&a), black_box(&b))))
        });
    }

    group.finish();
}

/// Square grid with noisy but consistent offsets.
fn grid_graph(side: u32) -> LayoutGraph {
    let mut rng = StdRng::seed_from_u64(3);
    let id = |col: u32, row: u32| TileId(row * side + col);

    let mut nodes = BTreeMap::new();
    let mut edges = Vec::new();
    for row in 0..side {
        for col in 0..side {
            let jitter = DVec2::new(rng.random_range(-4.0..4.0), rng.random_range(-4.0..4.0));
            nodes.insert(id(col, row), DVec2::new(col as f64, row as f64) * 90.0 + jitter);
            if col + 1 < side {
                let offset = DVec2::new(90.0 + rng.random_range(-0.5..0.5), 0.0);
                let weight = rng.random_range(0.0..10.0);
                edges.push(LayoutEdge::new(id(col, row), id(col + 1, row), offset, weight));
            }
            if row + 1 < side {
                let offset = DVec2::new(0.0, 90.0 + rng.random_range(-0.5..0.5));
                let weight = rng.random_range(0.0..10.0);
                edges.push(LayoutEdge::new(id(col, row), id(col, row + 1), offset, weight));
            }
        }
    }
    LayoutGraph::new(nodes, edges)
}

fn benchmark_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = RelaxConfig::default();

    for side in [8u32, 32] {
        let graph = grid_graph(side);
        group.bench_function(BenchmarkId::new("relax", side * side), |bench| {
            bench.iter(|| black_box(relax_layout(black_box(&graph), &config)))
        });
        group.bench_function(BenchmarkId::new("greedy", side * side), |bench| {
            bench.iter(|| black_box(highest_weight_first(black_box(&graph))))
        });
    }

    group.finish();
}
