//! End-to-end benchmark run on an already selected device.

use crate::config::{BenchmarkConfig, LaunchGeometry};
use crate::device::{Device, DeviceInfo};
use crate::dispatch::{DispatchOutcome, run_dispatch};
use crate::error::Result;
use crate::matrix::{Matrix, Operands};
use crate::reference::reference_product;
use crate::session::Session;
use crate::source::KernelSource;
use crate::stats::TimingSummary;
use crate::validation::{ValidationResult, validate_matrices};
use std::time::Duration;
use tracing::{info, warn};

/// Tuning knobs that do not change what is measured.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkOptions {
    /// Bound on each completion wait. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Operand seed. `None` draws one from OS entropy.
    pub seed: Option<u64>,
    /// Compute `C_ref` on a second host thread during dispatch.
    pub concurrent_reference: bool,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub device: DeviceInfo,
    pub config: BenchmarkConfig,
    pub geometry: LaunchGeometry,
    pub seed: u64,
    pub dispatch: DispatchOutcome,
    pub validation: ValidationResult,
}

impl BenchmarkReport {
    pub fn timing(&self) -> &TimingSummary {
        &self.dispatch.summary
    }

    pub fn gflops(&self) -> f64 {
        self.dispatch.summary.gflops(self.config.flop_count())
    }
}

/// Run the benchmark. See [`run_benchmark_with`].
pub fn run_benchmark<D: Device>(
    device: D,
    cfg: &BenchmarkConfig,
    geometry: &LaunchGeometry,
    source: &KernelSource,
    opts: &BenchmarkOptions,
) -> Result<BenchmarkReport> {
    run_benchmark_with(device, cfg, geometry, source, opts, |_| {})
}

/// Stage operands, build the kernel, dispatch `n_runs` times, read `C` back
/// and validate it against the host reference.
///
/// `geometry` is built from `cfg` with [`LaunchGeometry::new`] before a
/// device is selected, so argument errors never reach the device.
///
/// `on_timing` sees the timing summary as soon as dispatch finishes, before
/// readback. Every device object is released before this returns, on success
/// and on error.
pub fn run_benchmark_with<D: Device>(
    device: D,
    cfg: &BenchmarkConfig,
    geometry: &LaunchGeometry,
    source: &KernelSource,
    opts: &BenchmarkOptions,
    on_timing: impl FnOnce(&TimingSummary),
) -> Result<BenchmarkReport> {
    let info = device.info().clone();
    preflight(geometry, &info);

    let seed = opts.seed.unwrap_or_else(Operands::entropy_seed);
    info!(seed, m = cfg.m(), n = cfg.n(), k = cfg.k(), "generating operands");
    let Operands { a, b, .. } = Operands::generate(cfg, seed);

    let mut session = Session::new(device);
    session.stage(&a, &b, cfg.m() * cfg.n())?;
    session.load_kernel(source, cfg)?;

    let (dispatch, early_ref) = if opts.concurrent_reference {
        std::thread::scope(|scope| {
            let reference = scope.spawn(|| reference_product(&a, &b));
            let kernel = session.kernel_mut()?;
            let dispatch = run_dispatch(kernel, geometry, cfg.n_runs(), opts.timeout);
            let c_ref = match reference.join() {
                Ok(c_ref) => c_ref,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            Ok::<_, crate::error::BenchError>((dispatch?, Some(c_ref?)))
        })?
    } else {
        let kernel = session.kernel_mut()?;
        let dispatch = run_dispatch(kernel, geometry, cfg.n_runs(), opts.timeout)?;
        (dispatch, None)
    };
    on_timing(&dispatch.summary);

    let mut c = Matrix::zeros(cfg.m(), cfg.n());
    session.download_result(&mut c)?;
    session.release();

    let c_ref = match early_ref {
        Some(c_ref) => c_ref,
        None => reference_product(&a, &b)?,
    };
    let validation = validate_matrices(&c, &c_ref);
    if validation.passed() {
        info!("device result matches host reference");
    } else {
        warn!(
            errors = validation.error_count,
            max_abs_error = validation.max_abs_error,
            "device result differs from host reference"
        );
    }

    Ok(BenchmarkReport {
        device: info,
        config: *cfg,
        geometry: *geometry,
        seed,
        dispatch,
        validation,
    })
}

/// Warn about launch shapes the device is likely to reject.
fn preflight(geometry: &LaunchGeometry, info: &DeviceInfo) {
    if !geometry.fits(info.max_work_group_size) {
        warn!(
            work_group = geometry.work_group_size(),
            limit = info.max_work_group_size,
            "local size exceeds the device work-group limit; launch will likely fail"
        );
    }
    if !geometry.is_uniform() {
        warn!(
            global = ?geometry.global,
            local = ?geometry.local,
            "global size is not a multiple of local size; \
             requires non-uniform work-group support"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TILE;
    use crate::device::Platform;
    use crate::error::BenchError;
    use crate::host::{FaultPlan, HostPlatform, HostPlatformSpec};

    const KERNEL: &str = "__kernel void matrix_mult(__global const float* A, \
                          __global const float* B, __global float* C, \
                          int m, int n, int k, int n_works) {}";

    fn source() -> KernelSource {
        KernelSource::from_text("matrix_mult.cl", KERNEL)
    }

    fn opts() -> BenchmarkOptions {
        BenchmarkOptions { seed: Some(11), ..Default::default() }
    }

    fn run(platform: &HostPlatform, cfg: &BenchmarkConfig) -> Result<BenchmarkReport> {
        let geometry = LaunchGeometry::new(cfg, DEFAULT_TILE)?;
        run_benchmark(platform.open(0)?, cfg, &geometry, &source(), &opts())
    }

    fn with_faults(faults: FaultPlan) -> HostPlatform {
        HostPlatform::new(HostPlatformSpec { faults, ..Default::default() })
    }

    #[test]
    fn small_run_is_correct() {
        let platform = HostPlatform::new(HostPlatformSpec::default());
        let cfg = BenchmarkConfig::new(4, 4, 4, 3, 1).unwrap();
        let report = run(&platform, &cfg).unwrap();
        assert!(report.validation.passed());
        assert_eq!(report.dispatch.samples.len(), 3);
        assert!(report.timing().std_dev_ms >= 0.0);
        assert_eq!(platform.ledger().live(), 0);
    }

    #[test]
    fn concurrent_reference_gives_same_verdict() {
        let platform = HostPlatform::new(HostPlatformSpec::default());
        let cfg = BenchmarkConfig::new(8, 16, 8, 2, 4).unwrap();
        let geometry = LaunchGeometry::new(&cfg, DEFAULT_TILE).unwrap();
        let o = BenchmarkOptions { concurrent_reference: true, ..opts() };
        let device = platform.open(0).unwrap();
        let report = run_benchmark(device, &cfg, &geometry, &source(), &o).unwrap();
        assert!(report.validation.passed());
    }

    #[test]
    fn timing_callback_runs_before_readback_failure() {
        let platform = with_faults(FaultPlan { fail_download: true, ..Default::default() });
        let cfg = BenchmarkConfig::new(4, 4, 4, 2, 1).unwrap();
        let geometry = LaunchGeometry::new(&cfg, DEFAULT_TILE).unwrap();
        let mut seen = None;
        let device = platform.open(0).unwrap();
        let err = run_benchmark_with(device, &cfg, &geometry, &source(), &opts(), |t| {
            seen = Some(t.runs)
        })
        .unwrap_err();
        assert_eq!(seen, Some(2));
        assert_eq!(err.exit_code(), -3);
        assert_eq!(platform.ledger().live(), 0);
    }

    #[test]
    fn launch_failure_releases_resources() {
        let platform = with_faults(FaultPlan { fail_launch_on_run: Some(1), ..Default::default() });
        let cfg = BenchmarkConfig::new(4, 4, 4, 3, 1).unwrap();
        let err = run(&platform, &cfg).unwrap_err();
        assert!(matches!(err, BenchError::KernelExecution { run: 1, .. }));
        assert_eq!(platform.ledger().live(), 0);
    }

    #[test]
    fn compile_failure_releases_resources() {
        let platform = HostPlatform::new(HostPlatformSpec::default());
        let cfg = BenchmarkConfig::new(4, 4, 4, 1, 1).unwrap();
        let geometry = LaunchGeometry::new(&cfg, DEFAULT_TILE).unwrap();
        let bad = KernelSource::from_text("matrix_mult.cl", "__kernel void matrix_mul(int x) {}");
        let device = platform.open(0).unwrap();
        let err = run_benchmark(device, &cfg, &geometry, &bad, &opts()).unwrap_err();
        assert!(matches!(err, BenchError::CompileFailure { .. }));
        assert_eq!(platform.ledger().live(), 0);
    }

    #[test]
    fn corrupted_output_is_reported_not_raised() {
        let platform = with_faults(FaultPlan { corrupt_outputs: 3, ..Default::default() });
        let cfg = BenchmarkConfig::new(4, 4, 4, 1, 1).unwrap();
        let report = run(&platform, &cfg).unwrap();
        assert_eq!(report.validation.error_count, 3);
    }

    #[test]
    fn report_carries_seed_and_geometry() {
        let platform = HostPlatform::new(HostPlatformSpec::default());
        let cfg = BenchmarkConfig::new(4, 8, 4, 1, 2).unwrap();
        let report = run(&platform, &cfg).unwrap();
        assert_eq!(report.seed, 11);
        assert_eq!(report.geometry.global, [4, 4]);
        assert_eq!(report.geometry.local, [64, 32]);
        assert!(report.gflops() >= 0.0);
    }
}
