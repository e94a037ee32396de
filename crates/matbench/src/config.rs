//! Benchmark parameters and NDRange launch geometry.

use crate::error::{BenchError, Result};

/// Default work-group edge length. Local size is `{tile, tile / n_works}`.
pub const DEFAULT_TILE: usize = 64;

/// Validated, immutable benchmark parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkConfig {
    m: usize,
    n: usize,
    k: usize,
    n_runs: usize,
    n_works: usize,
}

impl BenchmarkConfig {
    /// Validate raw (possibly non-positive) values.
    ///
    /// All five values must be strictly positive, `n_works` must divide `n`,
    /// and the matrix dimensions must fit the kernel's 32-bit `int` arguments.
    pub fn new(m: i64, n: i64, k: i64, n_runs: i64, n_works: i64) -> Result<Self> {
        if m <= 0 || n <= 0 || k <= 0 || n_runs <= 0 {
            return Err(BenchError::InvalidArguments(format!(
                "Invalid input size or number of runs (m={m}, n={n}, k={k}, n_runs={n_runs})"
            )));
        }
        if n_works <= 0 {
            return Err(BenchError::InvalidArguments(format!(
                "n_works must be positive, got {n_works}"
            )));
        }
        for (name, value) in [("m", m), ("n", n), ("k", k), ("n_works", n_works)] {
            if value > i64::from(i32::MAX) {
                return Err(BenchError::InvalidArguments(format!(
                    "{name}={value} does not fit the kernel's int argument"
                )));
            }
        }
        if n % n_works != 0 {
            return Err(BenchError::InvalidArguments(format!(
                "n_works={n_works} must evenly divide n={n}"
            )));
        }

        let cfg = Self {
            m: to_usize(m)?,
            n: to_usize(n)?,
            k: to_usize(k)?,
            n_runs: to_usize(n_runs)?,
            n_works: to_usize(n_works)?,
        };
        // Reject dimensions whose buffers cannot be addressed on this host.
        for (rows, cols) in [(cfg.m, cfg.k), (cfg.k, cfg.n), (cfg.m, cfg.n)] {
            rows.checked_mul(cols)
                .and_then(|len| len.checked_mul(size_of::<f32>()))
                .ok_or_else(|| {
                    BenchError::InvalidArguments(format!("{rows}x{cols} matrix overflows usize"))
                })?;
        }
        Ok(cfg)
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    pub fn n_works(&self) -> usize {
        self.n_works
    }

    /// Scalar kernel arguments 3..=6 (`m`, `n`, `k`, `n_works`).
    pub fn kernel_scalars(&self) -> KernelScalars {
        // Range checked in `new`.
        KernelScalars {
            m: self.m as i32,
            n: self.n as i32,
            k: self.k as i32,
            n_works: self.n_works as i32,
        }
    }

    /// Floating-point operations performed by one multiplication.
    pub fn flop_count(&self) -> u64 {
        2 * self.m as u64 * self.n as u64 * self.k as u64
    }
}

fn to_usize(v: i64) -> Result<usize> {
    usize::try_from(v).map_err(|_| BenchError::InvalidArguments(format!("{v} out of range")))
}

/// The `int` arguments bound after the three buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelScalars {
    pub m: i32,
    pub n: i32,
    pub k: i32,
    pub n_works: i32,
}

/// Global and local NDRange sizes for one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub global: [usize; 2],
    pub local: [usize; 2],
}

impl LaunchGeometry {
    /// Global `{m, n / n_works}`, local `{tile, tile / n_works}`.
    pub fn new(cfg: &BenchmarkConfig, tile: usize) -> Result<Self> {
        if tile == 0 {
            return Err(BenchError::InvalidArguments("tile must be positive".into()));
        }
        if tile % cfg.n_works != 0 {
            return Err(BenchError::InvalidArguments(format!(
                "n_works={} must evenly divide tile={tile}",
                cfg.n_works
            )));
        }
        Ok(Self {
            global: [cfg.m, cfg.n / cfg.n_works],
            local: [tile, tile / cfg.n_works],
        })
    }

    /// Work-items per work-group.
    pub fn work_group_size(&self) -> usize {
        self.local[0] * self.local[1]
    }

    /// Whether the work-group fits the device limit.
    pub fn fits(&self, max_work_group_size: usize) -> bool {
        self.work_group_size() <= max_work_group_size
    }

    /// Whether every global dimension is a multiple of the local one
    /// (required by OpenCL 1.x uniform work-groups).
    pub fn is_uniform(&self) -> bool {
        self.global.iter().zip(self.local.iter()).all(|(g, l)| g % l == 0)
    }
}
