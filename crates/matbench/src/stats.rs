//! Per-run timing samples and their summary statistics.

use std::fmt;

/// One kernel execution time derived from device profiling timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    /// `CL_PROFILING_COMMAND_START` (or backend equivalent), nanoseconds.
    pub start_ns: u64,
    /// `CL_PROFILING_COMMAND_END`, nanoseconds.
    pub end_ns: u64,
}

impl TimingSample {
    pub fn from_timestamps(start_ns: u64, end_ns: u64) -> Self {
        Self { start_ns, end_ns }
    }

    /// Execution time in nanoseconds. A clock that runs backwards yields 0.
    pub fn exec_ns(&self) -> u64 {
        self.end_ns.saturating_sub(self.start_ns)
    }

    /// Execution time in milliseconds: `(end - start) * 1e-6`.
    pub fn millis(&self) -> f64 {
        self.exec_ns() as f64 * 1.0e-6
    }
}

/// Mean and population standard deviation over all runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSummary {
    pub runs: usize,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl TimingSummary {
    /// Summarize the samples, or `None` when there are none.
    pub fn from_samples(samples: &[TimingSample]) -> Option<Self> {
        let millis: Vec<f64> = samples.iter().map(TimingSample::millis).collect();
        Self::from_millis(&millis)
    }

    /// Summarize raw millisecond values.
    pub fn from_millis(millis: &[f64]) -> Option<Self> {
        if millis.is_empty() {
            return None;
        }
        let runs = millis.len();
        let mean_ms = millis.iter().sum::<f64>() / runs as f64;
        // Population variance: divide by n, not n - 1.
        let variance = millis.iter().map(|t| (t - mean_ms).powi(2)).sum::<f64>() / runs as f64;
        let min_ms = millis.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = millis.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self { runs, mean_ms, std_dev_ms: variance.sqrt(), min_ms, max_ms })
    }

    /// Throughput at the mean execution time.
    pub fn gflops(&self, flop_count: u64) -> f64 {
        if self.mean_ms <= 0.0 {
            return 0.0;
        }
        flop_count as f64 / (self.mean_ms * 1.0e6)
    }
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mean execution time: {:.6} ms", self.mean_ms)?;
        write!(f, "Standard deviation of execution time: {:.6} ms", self.std_dev_ms)
    }
}
