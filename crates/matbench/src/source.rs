//! Loading the external kernel source artifact.

use crate::error::{BenchError, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default artifact name, resolved against the working directory.
pub const DEFAULT_KERNEL_PATH: &str = "matrix_mult.cl";

/// Entry point every kernel source must define.
pub const ENTRY_POINT: &str = "matrix_mult";

/// Largest accepted source file (1 MiB).
pub const MAX_SOURCE_SIZE: u64 = 0x10_0000;

/// Kernel program text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    pub path: PathBuf,
    pub text: String,
}

impl KernelSource {
    /// Read a kernel file, refusing anything over [`MAX_SOURCE_SIZE`].
    ///
    /// Oversized files fail with `SourceTooLarge` rather than being cut off.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_limit(path, MAX_SOURCE_SIZE)
    }

    pub fn load_with_limit(path: impl AsRef<Path>, limit: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let not_found = |source| BenchError::SourceNotFound { path: path.clone(), source };

        let file = File::open(&path).map_err(not_found)?;
        // Read one byte past the limit to detect oversize without trusting metadata.
        let mut bytes = Vec::new();
        file.take(limit + 1).read_to_end(&mut bytes).map_err(not_found)?;
        if bytes.len() as u64 > limit {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(limit + 1);
            return Err(BenchError::SourceTooLarge { path, size, limit });
        }

        let text = String::from_utf8(bytes)
            .map_err(|source| BenchError::SourceNotUtf8 { path: path.clone(), source })?;
        debug!(path = %path.display(), bytes = text.len(), "loaded kernel source");
        Ok(Self { path, text })
    }

    /// Wrap in-memory text (tests, embedded kernels).
    pub fn from_text(name: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: name.into(), text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_small_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "__kernel void matrix_mult() {{}}").unwrap();
        let src = KernelSource::load(f.path()).unwrap();
        assert!(src.text.contains("matrix_mult"));
        assert_eq!(src.path, f.path());
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = KernelSource::load(dir.path().join("nope.cl")).unwrap_err();
        assert!(matches!(err, BenchError::SourceNotFound { .. }));
    }

    #[test]
    fn exactly_at_limit_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[b'x'; 16]).unwrap();
        let src = KernelSource::load_with_limit(f.path(), 16).unwrap();
        assert_eq!(src.text.len(), 16);
    }

    #[test]
    fn over_limit_is_rejected_not_truncated() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[b'x'; 17]).unwrap();
        let err = KernelSource::load_with_limit(f.path(), 16).unwrap_err();
        match err {
            BenchError::SourceTooLarge { size, limit, .. } => {
                assert_eq!(size, 17);
                assert_eq!(limit, 16);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_utf8_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0xff, 0xfe, 0x00]).unwrap();
        let err = KernelSource::load(f.path()).unwrap_err();
        assert!(matches!(err, BenchError::SourceNotUtf8 { .. }));
        assert!(err.to_string().contains("not valid UTF-8"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn default_limit_is_one_mib() {
        assert_eq!(MAX_SOURCE_SIZE, 1024 * 1024);
    }
}
