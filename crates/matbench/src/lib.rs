//! Matrix-multiply kernel micro-benchmark.
//!
//! This crate provides:
//! - [`config`]: validated `m`/`n`/`k`/`n_runs`/`n_works` and NDRange geometry
//! - [`device`]: backend traits and first-available device selection
//! - [`session`]: ownership and ordered release of every device object
//! - [`dispatch`]: the timed, serialized launch loop
//! - [`reference`] and [`validation`]: host product and tolerance check
//! - [`pipeline`]: the end-to-end run producing a [`BenchmarkReport`]
//!
//! Two backends implement [`device::Device`]: [`host`], always available,
//! and `opencl`, behind the `opencl` feature.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod matrix;
#[cfg(feature = "opencl")]
pub mod opencl;
pub mod pipeline;
pub mod reference;
pub mod session;
pub mod source;
pub mod stats;
pub mod validation;

pub use config::{BenchmarkConfig, DEFAULT_TILE, KernelScalars, LaunchGeometry};
pub use device::{DeviceInfo, select_first};
pub use error::{BenchError, Result};
pub use matrix::{Matrix, Operands};
pub use pipeline::{BenchmarkOptions, BenchmarkReport, run_benchmark, run_benchmark_with};
pub use source::{DEFAULT_KERNEL_PATH, ENTRY_POINT, KernelSource, MAX_SOURCE_SIZE};
pub use stats::{TimingSample, TimingSummary};
pub use validation::{TOLERANCE, ValidationResult};
