//! Benchmarks for the profiling pipeline, drift comparison and synthesis.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use term_profile::drift::ProfileComparator;
use term_profile::profile::{DatasetProfiler, ProfilerConfig};
use term_profile::synth::{SynthesisConfig, SyntheticDataGenerator};
use term_profile::test_fixtures::{correlated_batch, sample_orders_batch, session_for};
use tokio::runtime::Runtime;

fn bench_profile_orders(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let session = session_for("orders", sample_orders_batch()).unwrap();

    let mut group = c.benchmark_group("profile_orders");
    group.measurement_time(Duration::from_secs(10));

    for concurrency in [1usize, 4] {
        let profiler = DatasetProfiler::new(
            ProfilerConfig::builder()
                .max_concurrency(concurrency)
                .build(),
        );
        group.bench_with_input(
            BenchmarkId::new("max_concurrency", concurrency),
            &concurrency,
            |b, _| b.iter(|| rt.block_on(profiler.profile(black_box(&session)))),
        );
    }

    group.finish();
}

fn bench_correlation_pass(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("correlation_pass");
    group.measurement_time(Duration::from_secs(8));

    for rows in [1_000usize, 10_000] {
        let session = session_for("pairs", correlated_batch(rows, 0.8, 42)).unwrap();
        let profiler = DatasetProfiler::default();
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, _| {
            b.iter(|| rt.block_on(profiler.profile(black_box(&session))))
        });
    }

    group.finish();
}

fn bench_drift_and_synthesis(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let session = session_for("pairs", correlated_batch(5_000, 0.8, 7)).unwrap();
    let profile = rt
        .block_on(DatasetProfiler::default().profile(&session))
        .unwrap();

    c.bench_function("compare_identical_profiles", |b| {
        let comparator = ProfileComparator::default();
        b.iter(|| comparator.compare(black_box(&profile), black_box(&profile)))
    });

    let mut group = c.benchmark_group("synthesis");
    for rows in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut generator =
                    SyntheticDataGenerator::new(&profile, SynthesisConfig::default(), 1).unwrap();
                generator.generate(black_box(rows))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_profile_orders,
    bench_correlation_pass,
    bench_drift_and_synthesis
);

criterion_main!(benches);
