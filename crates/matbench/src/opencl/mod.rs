//! OpenCL backend over `opencl3`.
//!
//! Only compiled with the `opencl` feature; links against the system ICD
//! loader. The queue is created with profiling enabled so every launch event
//! carries device start/end timestamps.

mod kernel;

pub use kernel::{OpenClCompletion, OpenClKernel};

use crate::device::{AccessMode, Device, DeviceBuffer, DeviceInfo, Platform};
use crate::error::{BenchError, Result};
use crate::source::KernelSource;
use opencl3::command_queue::{CL_QUEUE_PROFILING_ENABLE, CommandQueue};
use opencl3::context::Context;
use opencl3::device::{CL_DEVICE_TYPE_ALL, Device as ClDevice};
use opencl3::error_codes::CL_DEVICE_NOT_FOUND;
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::{CL_BLOCKING, cl_device_id, cl_mem_flags};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// One OpenCL platform as reported by the ICD loader.
#[derive(Debug)]
pub struct OpenClPlatform {
    inner: opencl3::platform::Platform,
}

impl OpenClPlatform {
    /// Enumerate installed platforms.
    pub fn discover() -> Result<Vec<Self>> {
        let platforms = get_platforms().map_err(|e| {
            debug!("clGetPlatformIDs failed: {e}");
            BenchError::NoPlatformFound
        })?;
        Ok(platforms.into_iter().map(|inner| Self { inner }).collect())
    }
}

impl Platform for OpenClPlatform {
    type DeviceId = cl_device_id;
    type Device = OpenClDevice;

    fn name(&self) -> String {
        self.inner.name().unwrap_or_default()
    }

    fn device_ids(&self) -> Result<Vec<cl_device_id>> {
        match self.inner.get_devices(CL_DEVICE_TYPE_ALL) {
            Ok(ids) => Ok(ids),
            Err(e) if e.0 == CL_DEVICE_NOT_FOUND => Ok(Vec::new()),
            Err(e) => Err(BenchError::DeviceSetup(format!("device enumeration: {e}"))),
        }
    }

    fn open(&self, id: cl_device_id) -> Result<OpenClDevice> {
        let device = ClDevice::new(id);
        let info = DeviceInfo {
            platform_name: self.name(),
            name: device.name().unwrap_or_default(),
            vendor: device.vendor().unwrap_or_default(),
            compute_units: device.max_compute_units().unwrap_or_default(),
            max_work_group_size: device.max_work_group_size().unwrap_or_default(),
            global_mem_bytes: device.global_mem_size().unwrap_or_default(),
            local_mem_bytes: device.local_mem_size().unwrap_or_default(),
        };

        let context = Context::from_device(&device)
            .map_err(|e| BenchError::DeviceSetup(format!("context creation: {e}")))?;
        let queue =
            CommandQueue::create_default_with_properties(&context, CL_QUEUE_PROFILING_ENABLE, 0)
                .map_err(|e| BenchError::DeviceSetup(format!("command queue creation: {e}")))?;
        debug!(device = %info.name, "OpenCL context and profiling queue created");

        Ok(OpenClDevice { info, queue: Rc::new(queue), context })
    }
}

/// An opened OpenCL device with its context and in-order queue.
pub struct OpenClDevice {
    info: DeviceInfo,
    // Queue must drop before the context.
    queue: Rc<CommandQueue>,
    context: Context,
}

/// An `f32` buffer in device global memory.
pub struct OpenClBuffer {
    inner: Buffer<f32>,
    len: usize,
    mode: AccessMode,
}

impl DeviceBuffer for OpenClBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn mode(&self) -> AccessMode {
        self.mode
    }
}

fn mem_flags(mode: AccessMode) -> cl_mem_flags {
    match mode {
        AccessMode::ReadOnly => CL_MEM_READ_ONLY,
        AccessMode::WriteOnly => CL_MEM_WRITE_ONLY,
    }
}

impl Device for OpenClDevice {
    type Buffer = OpenClBuffer;
    type Kernel = OpenClKernel;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate(&self, len: usize, mode: AccessMode) -> Result<OpenClBuffer> {
        let bytes = len.saturating_mul(size_of::<f32>());
        if len == 0 {
            return Err(BenchError::Allocation { bytes, reason: "zero-sized buffer".into() });
        }
        // SAFETY: no host pointer is supplied, the runtime owns the storage.
        let inner = unsafe {
            Buffer::<f32>::create(&self.context, mem_flags(mode), len, std::ptr::null_mut())
        }
        .map_err(|e| BenchError::Allocation { bytes, reason: e.to_string() })?;
        debug!(len, ?mode, "OpenCL buffer allocated");
        Ok(OpenClBuffer { inner, len, mode })
    }

    fn upload(&self, src: &[f32], dst: &mut OpenClBuffer) -> Result<()> {
        if src.len() > dst.len {
            return Err(BenchError::upload(format!(
                "source ({}) exceeds buffer capacity ({})",
                src.len(),
                dst.len
            )));
        }
        // SAFETY: blocking write; `src` outlives the call and fits in `dst`.
        unsafe { self.queue.enqueue_write_buffer(&mut dst.inner, CL_BLOCKING, 0, src, &[]) }
            .map_err(|e| BenchError::upload(e.to_string()))?;
        Ok(())
    }

    fn download(&self, src: &OpenClBuffer, dst: &mut [f32]) -> Result<()> {
        if dst.len() > src.len {
            return Err(BenchError::download(format!(
                "destination ({}) exceeds buffer capacity ({})",
                dst.len(),
                src.len
            )));
        }
        // SAFETY: blocking read into a host slice no larger than `src`.
        unsafe { self.queue.enqueue_read_buffer(&src.inner, CL_BLOCKING, 0, dst, &[]) }
            .map_err(|e| BenchError::download(e.to_string()))?;
        Ok(())
    }

    fn compile(&self, source: &KernelSource, entry_point: &str) -> Result<OpenClKernel> {
        // On failure opencl3 hands back the build log.
        let program = Program::create_and_build_from_source(&self.context, &source.text, "")
            .map_err(|log| {
                warn!(path = %source.path.display(), "OpenCL program build failed");
                BenchError::CompileFailure { entry_point: entry_point.to_string(), log }
            })?;
        info!(path = %source.path.display(), "OpenCL program built");
        OpenClKernel::create(program, entry_point, Rc::clone(&self.queue))
    }
}
