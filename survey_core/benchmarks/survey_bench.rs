use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use survey_core::{decode, encode, BodyId, CoverageGrid, ScanRules};

fn painted_grid(height: u32, paints: usize) -> CoverageGrid {
    let mut rng = SmallRng::seed_from_u64(u64::from(height));
    let mut grid = CoverageGrid::new(BodyId(1), height * 2, height, 50.0).with_rules(ScanRules {
        auto_complete_threshold: 1.0,
        ..ScanRules::default()
    });
    for _ in 0..paints {
        grid.update_scan_data(
            true,
            rng.gen_range(-180.0..180.0),
            rng.gen_range(-90.0..90.0),
            rng.gen_range(1..8),
        );
    }
    grid
}

fn bench_paint(c: &mut Criterion) {
    let mut group = c.benchmark_group("paint");

    for height in [10u32, 150, 500] {
        group.bench_with_input(BenchmarkId::new("grid", height), &height, |b, &height| {
            b.iter_batched(
                || (painted_grid(height, 0), SmallRng::seed_from_u64(3)),
                |(mut grid, mut rng)| {
                    for _ in 0..64 {
                        grid.update_scan_data(
                            true,
                            rng.gen_range(-180.0..180.0),
                            rng.gen_range(-90.0..90.0),
                            rng.gen_range(1..8),
                        );
                    }
                    grid
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for height in [150u32, 500] {
        let grid = painted_grid(height, 400);
        let encoded = encode(grid.scanned());
        group.bench_with_input(BenchmarkId::new("encode", height), &grid, |b, grid| {
            b.iter(|| encode(grid.scanned()))
        });
        group.bench_with_input(BenchmarkId::new("decode", height), &encoded, |b, encoded| {
            b.iter(|| decode(encoded, height * 2, height))
        });
    }

    group.finish();
}

criterion_group!(survey_benches, bench_paint, bench_codec);
criterion_main!(survey_benches);
