use super::OpenClBuffer;
use crate::config::LaunchGeometry;
use crate::device::{Completion, ComputeKernel, KernelArgs, LaunchError};
use crate::error::{BenchError, Result};
use opencl3::command_queue::CommandQueue;
use opencl3::event::{CL_COMPLETE, Event};
use opencl3::kernel::Kernel;
use opencl3::memory::ClMem;
use opencl3::program::Program;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Poll interval for bounded waits.
const POLL_INTERVAL: Duration = Duration::from_micros(200);

/// A built `matrix_mult` kernel bound to its queue.
pub struct OpenClKernel {
    // Kernel must drop before its program.
    kernel: Kernel,
    _program: Program,
    queue: Rc<CommandQueue>,
    bound: bool,
}

impl OpenClKernel {
    pub(super) fn create(
        program: Program,
        entry_point: &str,
        queue: Rc<CommandQueue>,
    ) -> Result<Self> {
        let kernel = Kernel::create(&program, entry_point).map_err(|e| BenchError::CompileFailure {
            entry_point: entry_point.to_string(),
            log: format!("kernel creation failed: {e}"),
        })?;
        Ok(Self { kernel, _program: program, queue, bound: false })
    }

    fn set_arg<T>(&self, index: u32, value: &T) -> Result<()> {
        // SAFETY: `value` matches the declared parameter at `index`; the
        // runtime copies it before returning.
        unsafe { self.kernel.set_arg(index, value) }
            .map_err(|e| BenchError::KernelArgument { index, reason: e.to_string() })
    }
}

impl ComputeKernel for OpenClKernel {
    type Buffer = OpenClBuffer;
    type Completion = OpenClCompletion;

    fn bind(&mut self, args: KernelArgs<'_, OpenClBuffer>) -> Result<()> {
        let s = args.scalars;
        self.set_arg(0, &args.a.inner.get())?;
        self.set_arg(1, &args.b.inner.get())?;
        self.set_arg(2, &args.c.inner.get())?;
        self.set_arg(3, &s.m)?;
        self.set_arg(4, &s.n)?;
        self.set_arg(5, &s.k)?;
        self.set_arg(6, &s.n_works)?;
        self.bound = true;
        Ok(())
    }

    fn launch(
        &mut self,
        geometry: &LaunchGeometry,
    ) -> std::result::Result<OpenClCompletion, LaunchError> {
        if !self.bound {
            return Err(LaunchError::Failed("kernel arguments are not set".into()));
        }
        // SAFETY: all seven arguments are bound and both size arrays have
        // `work_dim` entries.
        let event = unsafe {
            self.queue.enqueue_nd_range_kernel(
                self.kernel.get(),
                2,
                std::ptr::null(),
                geometry.global.as_ptr(),
                geometry.local.as_ptr(),
                &[],
            )
        }
        .map_err(|e| LaunchError::Failed(format!("enqueue: {e}")))?;
        Ok(OpenClCompletion { event })
    }
}

/// Profiling event of one launch.
pub struct OpenClCompletion {
    event: Event,
}

impl Completion for OpenClCompletion {
    fn wait(&self, timeout: Option<Duration>) -> std::result::Result<(), LaunchError> {
        let Some(limit) = timeout else {
            return self.event.wait().map_err(|e| LaunchError::Failed(format!("wait: {e}")));
        };
        let started = Instant::now();
        loop {
            let status = self
                .event
                .command_execution_status()
                .map_err(|e| LaunchError::Failed(format!("status query: {e}")))?;
            match status.0 {
                CL_COMPLETE => return Ok(()),
                s if s < 0 => {
                    return Err(LaunchError::Failed(format!("command failed with status {s}")));
                }
                _ => {}
            }
            if started.elapsed() >= limit {
                return Err(LaunchError::TimedOut(limit));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn timestamps(&self) -> std::result::Result<(u64, u64), LaunchError> {
        let start = self
            .event
            .profiling_command_start()
            .map_err(|e| LaunchError::Failed(format!("profiling start: {e}")))?;
        let end = self
            .event
            .profiling_command_end()
            .map_err(|e| LaunchError::Failed(format!("profiling end: {e}")))?;
        Ok((start, end))
    }
}
