//! Ownership of every device object for one benchmark run.
//!
//! A [`Session`] owns the device (context and queue), the three matrix
//! buffers and the compiled kernel. Objects are released in reverse order of
//! creation, exactly once: either by an explicit [`Session::release`] or by
//! `Drop` when an error unwinds the pipeline.

use crate::config::BenchmarkConfig;
use crate::device::{AccessMode, ComputeKernel, Device, DeviceBuffer, KernelArgs};
use crate::error::{BenchError, Result};
use crate::matrix::Matrix;
use crate::source::{ENTRY_POINT, KernelSource};
use tracing::{debug, info};

/// Device buffers mirroring `A`, `B` and `C`.
#[derive(Debug)]
pub struct MatrixBuffers<B> {
    pub a: B,
    pub b: B,
    pub c: B,
}

/// Resource manager for one run.
pub struct Session<D: Device> {
    // Field order is release order.
    kernel: Option<D::Kernel>,
    buffers: Option<MatrixBuffers<D::Buffer>>,
    device: Option<D>,
}

impl<D: Device> Session<D> {
    pub fn new(device: D) -> Self {
        Self { kernel: None, buffers: None, device: Some(device) }
    }

    pub fn device(&self) -> Result<&D> {
        self.device.as_ref().ok_or_else(released)
    }

    /// Allocate one buffer of `len` elements.
    pub fn allocate(&self, len: usize, mode: AccessMode) -> Result<D::Buffer> {
        self.device()?.allocate(len, mode)
    }

    /// Blocking copy of `host` into `buffer`; sizes must match exactly.
    pub fn upload(&self, host: &Matrix, buffer: &mut D::Buffer) -> Result<()> {
        if host.len() != buffer.len() {
            return Err(BenchError::upload(format!(
                "matrix has {} elements, buffer holds {}",
                host.len(),
                buffer.len()
            )));
        }
        self.device()?.upload(host.as_slice(), buffer)
    }

    /// Blocking copy of `buffer` into `host`; sizes must match exactly.
    pub fn download(&self, buffer: &D::Buffer, host: &mut Matrix) -> Result<()> {
        if host.len() != buffer.len() {
            return Err(BenchError::download(format!(
                "matrix has {} elements, buffer holds {}",
                host.len(),
                buffer.len()
            )));
        }
        self.device()?.download(buffer, host.as_mut_slice())
    }

    /// Allocate `A`/`B` read-only and `C` write-only, then upload `A` and `B`.
    pub fn stage(&mut self, a: &Matrix, b: &Matrix, c_len: usize) -> Result<()> {
        let mut buf_a = self.allocate(a.len(), AccessMode::ReadOnly)?;
        let mut buf_b = self.allocate(b.len(), AccessMode::ReadOnly)?;
        let buf_c = self.allocate(c_len, AccessMode::WriteOnly)?;
        self.upload(a, &mut buf_a)?;
        self.upload(b, &mut buf_b)?;
        debug!(a = a.len(), b = b.len(), c = c_len, "operands staged on device");
        self.buffers = Some(MatrixBuffers { a: buf_a, b: buf_b, c: buf_c });
        Ok(())
    }

    pub fn buffers(&self) -> Result<&MatrixBuffers<D::Buffer>> {
        self.buffers
            .as_ref()
            .ok_or_else(|| BenchError::DeviceSetup("buffers have not been staged".into()))
    }

    /// Compile `source` for the device and bind the seven arguments.
    pub fn load_kernel(&mut self, source: &KernelSource, cfg: &BenchmarkConfig) -> Result<()> {
        let mut kernel = self.device()?.compile(source, ENTRY_POINT)?;
        let buffers = self.buffers()?;
        kernel.bind(KernelArgs {
            a: &buffers.a,
            b: &buffers.b,
            c: &buffers.c,
            scalars: cfg.kernel_scalars(),
        })?;
        info!(path = %source.path.display(), entry_point = ENTRY_POINT, "kernel built and bound");
        self.kernel = Some(kernel);
        Ok(())
    }

    pub fn kernel_mut(&mut self) -> Result<&mut D::Kernel> {
        self.kernel
            .as_mut()
            .ok_or_else(|| BenchError::DeviceSetup("kernel has not been loaded".into()))
    }

    /// Read `C` back into `host`.
    pub fn download_result(&self, host: &mut Matrix) -> Result<()> {
        let buffers = self.buffers()?;
        self.download(&buffers.c, host)
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none()
    }

    /// Release kernel, buffers, then queue and context. Idempotent.
    pub fn release(&mut self) {
        if self.is_released() {
            return;
        }
        drop(self.kernel.take());
        drop(self.buffers.take());
        drop(self.device.take());
        debug!("device resources released");
    }
}

impl<D: Device> Drop for Session<D> {
    fn drop(&mut self) {
        self.release();
    }
}

fn released() -> BenchError {
    BenchError::DeviceSetup("session already released".into())
}
