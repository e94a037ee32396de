//! Backend-neutral device capabilities and first-available device selection.
//!
//! A backend provides a [`Platform`] list, a [`Device`] that owns the
//! context/queue and can allocate, transfer and compile, and a
//! [`ComputeKernel`] whose launches yield a [`Completion`] carrying profiling
//! timestamps. The dispatch loop only sees the kernel and completion traits.

use crate::config::{KernelScalars, LaunchGeometry};
use crate::error::{BenchError, Result};
use crate::source::KernelSource;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// How the device will access a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
}

/// Identity and limits of the selected device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub platform_name: String,
    pub name: String,
    pub vendor: String,
    pub compute_units: u32,
    pub max_work_group_size: usize,
    pub global_mem_bytes: u64,
    pub local_mem_bytes: u64,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device name: {}", self.name)?;
        writeln!(f, "Compute units: {}", self.compute_units)?;
        writeln!(f, "Max workgroup size: {}", self.max_work_group_size)?;
        writeln!(f, "Global memory size: {} bytes", self.global_mem_bytes)?;
        write!(f, "Local memory size : {} bytes", self.local_mem_bytes)
    }
}

/// A compute platform exposing zero or more devices.
pub trait Platform {
    type DeviceId;
    type Device: Device;

    fn name(&self) -> String;

    /// Devices of any type, in enumeration order. Empty when there are none.
    fn device_ids(&self) -> Result<Vec<Self::DeviceId>>;

    /// Create the context and queue for one device.
    fn open(&self, id: Self::DeviceId) -> Result<Self::Device>;
}

/// Pick the first device of the first platform.
pub fn select_first<P: Platform>(platforms: Vec<P>) -> Result<P::Device> {
    debug!(platforms = platforms.len(), "enumerated compute platforms");
    let platform = platforms.into_iter().next().ok_or(BenchError::NoPlatformFound)?;
    let platform_name = platform.name();

    let ids = platform.device_ids()?;
    debug!(platform = %platform_name, devices = ids.len(), "enumerated devices");
    let id = ids
        .into_iter()
        .next()
        .ok_or_else(|| BenchError::NoDeviceFound { platform: platform_name.clone() })?;

    let device = platform.open(id)?;
    info!(platform = %platform_name, device = %device.info().name, "selected device");
    Ok(device)
}

/// A device-resident `f32` allocation.
pub trait DeviceBuffer {
    /// Capacity in elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mode(&self) -> AccessMode;
}

/// An opened accelerator: allocation, transfer and compilation.
pub trait Device {
    type Buffer: DeviceBuffer;
    type Kernel: ComputeKernel<Buffer = Self::Buffer>;

    fn info(&self) -> &DeviceInfo;

    fn allocate(&self, len: usize, mode: AccessMode) -> Result<Self::Buffer>;

    /// Blocking host-to-device copy of `src` into the start of `dst`.
    fn upload(&self, src: &[f32], dst: &mut Self::Buffer) -> Result<()>;

    /// Blocking device-to-host copy filling `dst` from the start of `src`.
    fn download(&self, src: &Self::Buffer, dst: &mut [f32]) -> Result<()>;

    /// Build `source` and create the kernel named `entry_point`.
    ///
    /// Build failures return `CompileFailure` carrying the compiler log.
    fn compile(&self, source: &KernelSource, entry_point: &str) -> Result<Self::Kernel>;
}

/// The seven kernel arguments, in binding order.
#[derive(Debug)]
pub struct KernelArgs<'a, B> {
    pub a: &'a B,
    pub b: &'a B,
    pub c: &'a B,
    pub scalars: KernelScalars,
}

/// Why a launch or its completion failed.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchError {
    Failed(String),
    TimedOut(Duration),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "{reason}"),
            Self::TimedOut(d) => write!(f, "timed out after {d:?}"),
        }
    }
}

/// A compiled kernel with a fixed entry point.
pub trait ComputeKernel {
    type Buffer;
    type Completion: Completion;

    /// Bind arguments once; they stay bound for every later launch.
    fn bind(&mut self, args: KernelArgs<'_, Self::Buffer>) -> Result<()>;

    /// Enqueue one 2D launch. Returns before the device finishes.
    fn launch(
        &mut self,
        geometry: &LaunchGeometry,
    ) -> std::result::Result<Self::Completion, LaunchError>;
}

/// Completion signal for one launch.
pub trait Completion {
    /// Block until done, or until `timeout` elapses when given.
    fn wait(&self, timeout: Option<Duration>) -> std::result::Result<(), LaunchError>;

    /// Device start/end timestamps in nanoseconds. Valid after `wait`.
    fn timestamps(&self) -> std::result::Result<(u64, u64), LaunchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostPlatform, HostPlatformSpec};

    fn info() -> DeviceInfo {
        DeviceInfo {
            platform_name: "p".into(),
            name: "Accel 9000".into(),
            vendor: "v".into(),
            compute_units: 32,
            max_work_group_size: 1024,
            global_mem_bytes: 8_589_934_592,
            local_mem_bytes: 65_536,
        }
    }

    // ── DeviceInfo ──────────────────────────────────────────────────

    #[test]
    fn display_lists_identity_and_limits() {
        let text = info().to_string();
        assert!(text.contains("Device name: Accel 9000"));
        assert!(text.contains("Compute units: 32"));
        assert!(text.contains("Max workgroup size: 1024"));
        assert!(text.contains("Global memory size: 8589934592 bytes"));
        assert!(text.contains("Local memory size : 65536 bytes"));
    }

    // ── Selection ───────────────────────────────────────────────────

    #[test]
    fn empty_platform_list_is_no_platform() {
        let err = select_first(Vec::<HostPlatform>::new()).unwrap_err();
        assert!(matches!(err, BenchError::NoPlatformFound));
    }

    #[test]
    fn platform_without_devices_is_no_device() {
        let spec = HostPlatformSpec { devices: 0, ..Default::default() };
        let platforms = vec![HostPlatform::new(spec)];
        let err = select_first(platforms).unwrap_err();
        match err {
            BenchError::NoDeviceFound { platform } => assert!(!platform.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_platform_wins_even_if_later_has_devices() {
        let platforms = vec![
            HostPlatform::new(HostPlatformSpec { devices: 0, ..Default::default() }),
            HostPlatform::new(HostPlatformSpec::default()),
        ];
        assert!(select_first(platforms).is_err());
    }

    #[test]
    fn first_device_selected() {
        let spec = HostPlatformSpec { devices: 3, ..Default::default() };
        let platforms = vec![HostPlatform::new(spec)];
        let device = select_first(platforms).unwrap();
        assert!(device.info().name.ends_with("#0"));
    }

    #[test]
    fn launch_error_display() {
        assert_eq!(LaunchError::Failed("bad size".into()).to_string(), "bad size");
        assert!(LaunchError::TimedOut(Duration::from_millis(3)).to_string().contains("3ms"));
    }
}
