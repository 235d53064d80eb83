//! Benchmarks for landscape algorithms

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use landshift_algorithms::landscape::{edge_distance, ffqi};
use landshift_core::{GeoTransform, Raster};

/// Patchy land-cover: forest (1) broken by a deterministic pattern of
/// cropland (9)
fn create_lulc(size: usize) -> Raster<i32> {
    let mut r = Raster::filled(size, size, 1);
    r.set_transform(GeoTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0));
    for row in 0..size {
        for col in 0..size {
            if (row * 7 + col * 13) % 97 < 20 {
                r.set(row, col, 9).unwrap();
            }
        }
    }
    r
}

fn bench_edge_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("landscape/edge_distance");
    let forest: BTreeSet<i32> = [1].into_iter().collect();
    for size in [256, 512, 1024, 2048] {
        let lulc = create_lulc(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| edge_distance(black_box(&lulc), &forest).unwrap())
        });
    }
    group.finish();
}

fn bench_ffqi(c: &mut Criterion) {
    let mut group = c.benchmark_group("landscape/ffqi");
    let natural: BTreeSet<i32> = [1].into_iter().collect();
    for size in [256, 512, 1024, 2048] {
        let lulc = create_lulc(size);
        for sigma in [3.0, 9.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("sigma{}", sigma), size),
                &size,
                |b, _| b.iter(|| ffqi(black_box(&lulc), &natural, sigma).unwrap()),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_edge_distance, bench_ffqi);
criterion_main!(benches);
