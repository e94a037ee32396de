//! Criterion benchmarks for the host side of a run: the reference product
//! and the host backend's emulated kernel.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use matbench::device::Platform;
use matbench::host::{HostPlatform, HostPlatformSpec};
use matbench::reference::ref_matmul;
use matbench::{
    BenchmarkConfig, BenchmarkOptions, DEFAULT_TILE, KernelSource, LaunchGeometry, Operands,
    run_benchmark,
};
use std::hint::black_box;

const KERNEL: &str = include_str!("../../matbench-cli/kernels/matrix_mult.cl");

fn bench_reference(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference_matmul");

    for &size in &[32usize, 64, 128] {
        let cfg = BenchmarkConfig::new(size as i64, size as i64, size as i64, 1, 1).unwrap();
        let ops = Operands::generate(&cfg, 7);
        group.throughput(Throughput::Elements(cfg.flop_count()));
        group.bench_with_input(BenchmarkId::new("naive", format!("{size}^3")), &size, |bench, &s| {
            let mut out = vec![0.0f32; s * s];
            bench.iter(|| {
                ref_matmul(
                    black_box(ops.a.as_slice()),
                    black_box(ops.b.as_slice()),
                    black_box(&mut out),
                    s,
                    s,
                    s,
                );
            });
        });
    }
    group.finish();
}

fn bench_host_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_pipeline");
    group.sample_size(10);

    let source = KernelSource::from_text("matrix_mult.cl", KERNEL);
    for &n_works in &[1i64, 4] {
        let cfg = BenchmarkConfig::new(64, 64, 64, 3, n_works).unwrap();
        let geometry = LaunchGeometry::new(&cfg, DEFAULT_TILE).unwrap();
        let opts = BenchmarkOptions { seed: Some(1), ..Default::default() };
        group.bench_function(BenchmarkId::new("n_works", n_works), |bench| {
            bench.iter(|| {
                let platform = HostPlatform::new(HostPlatformSpec::default());
                let device = platform.open(0).unwrap();
                let report = run_benchmark(device, &cfg, &geometry, &source, &opts).unwrap();
                assert!(report.validation.passed());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reference, bench_host_pipeline);
criterion_main!(benches);
