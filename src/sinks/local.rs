//! Local file writer opened once in append mode

use super::{ensure_parent_dir, error_path, LogWriter, SplitSink};
use crate::core::options::LocalFsConfig;
use crate::core::{LoggerError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct LocalFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl LocalFile {
    /// Open `path` for appending, creating it and its parent directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_parent_dir(&path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

impl LogWriter for LocalFile {
    fn write_record(&self, buf: &[u8]) -> Result<()> {
        self.file.lock().write_all(buf).map_err(|e| {
            LoggerError::file_sink(
                self.path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })
    }

    fn flush(&self) -> Result<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Open the normal and error files described by `config`
pub fn open_split(config: &LocalFsConfig) -> Result<SplitSink<LocalFile>> {
    let normal = LocalFile::open(&config.path)?;
    let error = LocalFile::open(error_path(&config.path, &config.error_suffix))?;
    Ok(SplitSink::new(normal, error, config.error_level))
}
