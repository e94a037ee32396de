//! Error taxonomy for the benchmark pipeline.
//!
//! Every variant is terminal: the pipeline never retries, it unwinds through
//! the owning [`Session`](crate::session::Session) (which releases device
//! resources) and the binary maps the error to a process exit code.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Direction of a host/device transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "host-to-device"),
            Self::Download => write!(f, "device-to-host"),
        }
    }
}

/// Errors produced by the benchmark pipeline.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("kernel source not found at '{}': {source}", path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("kernel source '{}' is {size} bytes, limit is {limit} bytes", path.display())]
    SourceTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("kernel source '{}' is not valid UTF-8: {source}", path.display())]
    SourceNotUtf8 {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("no compute platform found")]
    NoPlatformFound,

    #[error("no compute device found on platform '{platform}'")]
    NoDeviceFound { platform: String },

    #[error("device setup failed: {0}")]
    DeviceSetup(String),

    #[error("kernel '{entry_point}' failed to compile:\n{log}")]
    CompileFailure { entry_point: String, log: String },

    #[error("failed to bind kernel argument {index}: {reason}")]
    KernelArgument { index: u32, reason: String },

    #[error("buffer allocation of {bytes} bytes failed: {reason}")]
    Allocation { bytes: usize, reason: String },

    #[error("{direction} transfer failed: {reason}")]
    Transfer {
        direction: TransferDirection,
        reason: String,
    },

    #[error("kernel execution failed on run {run}: {reason}")]
    KernelExecution { run: usize, reason: String },

    #[error("kernel run {run} did not complete within {waited:?}")]
    Timeout { run: usize, waited: Duration },
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Exit code for argument validation failures.
pub const EXIT_INVALID_ARGUMENTS: i32 = -1;
/// Exit code for kernel launch, wait or timeout failures.
pub const EXIT_KERNEL_EXECUTION: i32 = -2;
/// Exit code for result readback failures.
pub const EXIT_READBACK: i32 = -3;
/// Exit code for every other fatal error.
pub const EXIT_FATAL: i32 = 1;

impl BenchError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArguments(_) => EXIT_INVALID_ARGUMENTS,
            Self::KernelExecution { .. } | Self::Timeout { .. } => EXIT_KERNEL_EXECUTION,
            Self::Transfer { direction: TransferDirection::Download, .. } => EXIT_READBACK,
            _ => EXIT_FATAL,
        }
    }

    pub(crate) fn upload(reason: impl Into<String>) -> Self {
        Self::Transfer { direction: TransferDirection::Upload, reason: reason.into() }
    }

    pub(crate) fn download(reason: impl Into<String>) -> Self {
        Self::Transfer { direction: TransferDirection::Download, reason: reason.into() }
    }
}
