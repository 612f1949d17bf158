//! Benchmarks for the routing components.
//!
//! Run with: `cargo bench --bench routing_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use basinflow::{sub_routing, Basin, HydroRouter, RoutingConfig, RoutingContext, WorkState};

/// Grid basin with column drawdown so both routing layers have work to do.
fn setup_basin(nx: usize, ny: usize) -> Basin {
    let mut basin = Basin::uniform_slope(nx, ny, 10.0, 5.0);
    for (i, p) in basin.patches.iter_mut().enumerate() {
        p.sat_deficit = 0.05;
        p.sat_deficit_z = 0.12;
        p.detention_store = 0.012 + 1.0e-4 * (i % 7) as f64;
        p.soil_ns.nitrate = 0.01;
        p.soil_cs.doc = 0.02;
    }
    basin
}

/// Benchmark the subsurface router in isolation.
fn bench_sub_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sub_routing");

    for n in [16usize, 32, 64] {
        let basin = setup_basin(n, n);
        let ctx = RoutingContext::build(&basin, 1.0).unwrap();
        let mut work = WorkState::new(ctx.n_patches);
        work.load(&basin);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_patches", n * n)),
            &n,
            |b, _| {
                b.iter(|| {
                    let dt = sub_routing(black_box(&ctx), black_box(&mut work), 3600.0);
                    black_box(dt)
                })
            },
        );
    }
    group.finish();
}

/// Benchmark one full external step through the driver.
fn bench_external_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydro_routing");
    group.sample_size(20);

    for n in [16usize, 32] {
        let basin = setup_basin(n, n);
        let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_patches", n * n)),
            &n,
            |b, _| {
                b.iter_batched(
                    || basin.clone(),
                    |mut basin| {
                        let report = router.route(&mut basin, 600.0);
                        black_box(report)
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_sub_routing, bench_external_step);
criterion_main!(benches);
