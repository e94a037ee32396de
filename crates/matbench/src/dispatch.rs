//! The timed dispatch loop.
//!
//! Launches strictly one at a time: each launch is waited on before the next
//! is enqueued so device timestamps never include another run's work.

use crate::config::LaunchGeometry;
use crate::device::{Completion, ComputeKernel, LaunchError};
use crate::error::{BenchError, Result};
use crate::stats::{TimingSample, TimingSummary};
use std::time::Duration;
use tracing::{debug, info};

/// Samples from a completed dispatch loop and their summary.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub samples: Vec<TimingSample>,
    pub summary: TimingSummary,
}

/// Launch `kernel` `n_runs` times and collect one timing sample per run.
///
/// The first launch, wait or timestamp failure aborts the loop and the
/// samples gathered so far are dropped.
pub fn run_dispatch<K: ComputeKernel>(
    kernel: &mut K,
    geometry: &LaunchGeometry,
    n_runs: usize,
    timeout: Option<Duration>,
) -> Result<DispatchOutcome> {
    if n_runs == 0 {
        return Err(BenchError::InvalidArguments("n_runs must be positive".into()));
    }
    info!(n_runs, global = ?geometry.global, local = ?geometry.local, "dispatching kernel");

    let mut samples = Vec::with_capacity(n_runs);
    for run in 0..n_runs {
        let completion = kernel.launch(geometry).map_err(|e| execution_error(run, e))?;
        completion.wait(timeout).map_err(|e| execution_error(run, e))?;
        let (start_ns, end_ns) = completion.timestamps().map_err(|e| execution_error(run, e))?;

        let sample = TimingSample::from_timestamps(start_ns, end_ns);
        debug!(run, ms = sample.millis(), "kernel run complete");
        samples.push(sample);
    }

    // n_runs > 0, so there is at least one sample.
    let summary = TimingSummary::from_samples(&samples)
        .ok_or_else(|| BenchError::InvalidArguments("no timing samples".into()))?;
    info!(mean_ms = summary.mean_ms, std_dev_ms = summary.std_dev_ms, "dispatch finished");
    Ok(DispatchOutcome { samples, summary })
}

fn execution_error(run: usize, err: LaunchError) -> BenchError {
    match err {
        LaunchError::Failed(reason) => BenchError::KernelExecution { run, reason },
        LaunchError::TimedOut(waited) => BenchError::Timeout { run, waited },
    }
}
