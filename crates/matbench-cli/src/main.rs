//! matbench CLI
//!
//! Times a `matrix_mult` OpenCL kernel over `n_runs` launches on the first
//! available device and validates the result against a host reference.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use matbench::device::Device;
use matbench::host::HostPlatform;
use matbench::{
    BenchError, BenchmarkConfig, BenchmarkOptions, DEFAULT_KERNEL_PATH, DEFAULT_TILE,
    KernelSource, LaunchGeometry, run_benchmark_with, select_first,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

mod exit;

use exit::{EXIT_FATAL, EXIT_INVALID_ARGUMENTS, EXIT_SUCCESS};

/// Matrix-multiply kernel micro-benchmark
#[derive(Parser, Debug)]
#[command(name = "matbench")]
#[command(version)]
#[command(about = "Time a matrix_mult kernel and validate it against a host reference")]
#[command(long_about = r#"
Multiplies a random m x k matrix A by a random k x n matrix B on the first
device of the first compute platform, n_runs times, then checks the last
result against a host reference product.

Each kernel work-item computes n_works adjacent output columns of one row.

Examples:
  # 512^3 product, 10 runs, 4 columns per work-item
  matbench 512 512 512 10 4

  # Reproducible inputs, bounded waits
  matbench 256 256 256 5 1 --seed 42 --timeout-ms 2000

  # Exercise the harness without a GPU (the kernel source is not executed)
  matbench 64 64 64 3 1 --backend host
"#)]
#[command(allow_negative_numbers = true)]
struct Cli {
    /// Rows of A and C
    m: i64,
    /// Columns of B and C
    n: i64,
    /// Columns of A, rows of B
    k: i64,
    /// Number of timed kernel launches
    n_runs: i64,
    /// Output columns per work-item; must divide n and the tile size
    n_works: i64,

    /// Kernel source file
    #[arg(
        long,
        value_name = "PATH",
        env = "MATBENCH_KERNEL",
        default_value = DEFAULT_KERNEL_PATH
    )]
    kernel: PathBuf,

    /// Work-group edge; local size is {tile, tile / n_works}
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TILE)]
    tile: usize,

    /// Compute backend; `host` emulates the kernel on the CPU without running its source
    #[arg(long, value_enum, default_value_t = Backend::Opencl)]
    backend: Backend,

    /// Seed for the random operands (default: OS entropy)
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Fail a run whose completion takes longer than this
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Compute the host reference while the kernel runs
    #[arg(long)]
    concurrent_reference: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// CPU emulation of the kernel contract
    Host,
    /// First OpenCL platform and device
    Opencl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_INVALID_ARGUMENTS,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = setup_logging(&cli.log_level, cli.log_format) {
        eprintln!("Error: {e:#}");
        std::process::exit(EXIT_FATAL);
    }

    let code = match run(&cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => report_error(&e),
    };
    std::process::exit(code);
}

/// Install a stderr subscriber so stdout carries only the report.
fn setup_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => {
            subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).try_init()
        }
        LogFormat::Compact => subscriber.compact().try_init(),
        LogFormat::Pretty => subscriber.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn run(cli: &Cli) -> matbench::Result<()> {
    let cfg = BenchmarkConfig::new(cli.m, cli.n, cli.k, cli.n_runs, cli.n_works)?;
    let geometry = LaunchGeometry::new(&cfg, cli.tile)?;
    let source = KernelSource::load(&cli.kernel)?;
    let opts = BenchmarkOptions {
        timeout: cli.timeout_ms.map(Duration::from_millis),
        seed: cli.seed,
        concurrent_reference: cli.concurrent_reference,
    };

    let job = Job { cfg: &cfg, geometry: &geometry, source: &source, opts: &opts };
    match cli.backend {
        Backend::Host => execute(select_first(HostPlatform::discover())?, &job),
        Backend::Opencl => open_opencl().and_then(|device| execute(device, &job)),
    }
}

#[cfg(feature = "opencl")]
fn open_opencl() -> matbench::Result<matbench::opencl::OpenClDevice> {
    select_first(matbench::opencl::OpenClPlatform::discover()?)
}

#[cfg(not(feature = "opencl"))]
fn open_opencl() -> matbench::Result<matbench::host::HostDevice> {
    Err(BenchError::DeviceSetup(
        "this binary was built without the `opencl` feature; use --backend host".into(),
    ))
}

/// Arguments validated before any device is touched.
struct Job<'a> {
    cfg: &'a BenchmarkConfig,
    geometry: &'a LaunchGeometry,
    source: &'a KernelSource,
    opts: &'a BenchmarkOptions,
}

fn execute<D: Device>(device: D, job: &Job<'_>) -> matbench::Result<()> {
    println!("{}", device.info());

    let report =
        run_benchmark_with(device, job.cfg, job.geometry, job.source, job.opts, |timing| {
            println!("{timing}");
            println!("Min execution time: {:.6} ms", timing.min_ms);
            println!("Max execution time: {:.6} ms", timing.max_ms);
        })?;

    println!("{}", report.validation);
    println!("Throughput: {:.3} GFLOP/s", report.gflops());
    info!(seed = report.seed, runs = report.timing().runs, "benchmark complete");
    Ok(())
}

/// Log the failure, print what the user needs on stdout, and pick the code.
fn report_error(err: &BenchError) -> i32 {
    match err {
        BenchError::InvalidArguments(reason) => println!("{reason}"),
        BenchError::SourceNotFound { .. } => println!("Failed to open kernel file."),
        BenchError::SourceTooLarge { .. } | BenchError::SourceNotUtf8 { .. } => println!("{err}"),
        BenchError::CompileFailure { log, .. } => println!("Build log:\n{log}"),
        BenchError::KernelExecution { .. } | BenchError::Timeout { .. } => {
            println!("Error: Failed to execute kernel")
        }
        BenchError::Transfer { direction: matbench::error::TransferDirection::Download, .. } => {
            println!("Error reading result buffer")
        }
        _ => {}
    }
    error!("{err}");
    eprintln!("Error: {err}");
    err.exit_code()
}
