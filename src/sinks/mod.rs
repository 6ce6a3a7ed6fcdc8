//! File sinks and severity routing between their normal and error halves

pub mod compress;
pub mod local;
pub mod rotating;

pub use compress::Compressor;
pub use local::LocalFile;
pub use rotating::{RotatingWriter, RotationPolicy};

use crate::core::{Level, LoggerError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Destination of encoded records. Implementations serialise concurrent
/// writers internally and never buffer across calls.
pub trait LogWriter: Send + Sync {
    fn write_record(&self, buf: &[u8]) -> Result<()>;
    fn flush(&self) -> Result<()>;
    fn path(&self) -> &Path;

    /// Wait for background work (compression) to finish
    fn wait_idle(&self, _timeout: Duration) -> bool {
        true
    }
}

/// A pair of writers: records at or above `error_level` go to the error
/// half, everything else to the normal half.
pub struct SplitSink<W> {
    normal: W,
    error: W,
    error_level: Level,
}

impl<W: LogWriter> SplitSink<W> {
    pub fn new(normal: W, error: W, error_level: Level) -> Self {
        Self {
            normal,
            error,
            error_level,
        }
    }

    pub fn route(&self, level: Level) -> &W {
        if level >= self.error_level {
            &self.error
        } else {
            &self.normal
        }
    }

    pub fn write(&self, level: Level, buf: &[u8]) -> Result<()> {
        self.route(level).write_record(buf)
    }

    pub fn flush(&self) -> Result<()> {
        self.normal.flush()?;
        self.error.flush()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        // Both halves share the deadline.
        let start = std::time::Instant::now();
        let normal = self.normal.wait_idle(timeout);
        let error = self.error.wait_idle(timeout.saturating_sub(start.elapsed()));
        normal && error
    }

    pub fn normal(&self) -> &W {
        &self.normal
    }

    pub fn error(&self) -> &W {
        &self.error
    }

    pub fn error_level(&self) -> Level {
        self.error_level
    }
}

/// Derive the error-file path by inserting `.<suffix>` before the extension:
/// `a/b/c.log` becomes `a/b/c.err.log`.
pub fn error_path(path: &Path, suffix: &str) -> PathBuf {
    let suffix = suffix.trim_matches('.');
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}.{}", stem, suffix),
    };
    path.with_file_name(name)
}

/// Create the parent directory of a log file if it doesn't exist
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}
