//! Size-rotated log file with age/count retention and optional compression
//!
//! The active file is opened lazily on the first write. When a write would
//! push it past `max_size`, it is renamed to a backup stamped with the UTC
//! time (`app.2024-01-02T15-04-05.000.log`) and a fresh file takes its place.
//! Retention runs right after each rotation; compression runs on a worker
//! thread.

use super::compress::{gz_path, Compressor};
use super::{ensure_parent_dir, error_path, LogWriter, SplitSink};
use crate::core::error::{ErrorHandler, LoggerError, Result};
use crate::core::options::RotateConfig;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Timelike, Utc};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Layout of the timestamp embedded in backup names
pub const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size limit of the active file in bytes
    pub max_size: u64,
    /// Backups to keep, 0 keeps all
    pub max_backups: usize,
    /// Maximum backup age, zero keeps all
    pub max_age: Duration,
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_backups: 0,
            max_age: Duration::ZERO,
            compress: false,
        }
    }
}

impl RotationPolicy {
    pub fn from_config(config: &RotateConfig) -> Self {
        let max_size = if config.max_size_kb == 0 {
            DEFAULT_MAX_SIZE
        } else {
            config.max_size_kb.saturating_mul(1024)
        };
        Self {
            max_size,
            max_backups: config.max_backups,
            max_age: config.max_age,
            compress: config.compress,
        }
    }
}

struct ActiveFile {
    file: Option<File>,
    size: u64,
    last_backup: Option<NaiveDateTime>,
}

/// A rotated backup found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub path: PathBuf,
    pub time: NaiveDateTime,
    pub compressed: bool,
}

pub struct RotatingWriter {
    path: PathBuf,
    stem: String,
    ext: Option<String>,
    policy: RotationPolicy,
    state: Mutex<ActiveFile>,
    compressor: Option<Compressor>,
    on_error: ErrorHandler,
}

impl RotatingWriter {
    /// Prepare a writer for `path`. Only the directory is created here; the
    /// file itself is opened on first write.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy, on_error: ErrorHandler) -> Result<Self> {
        let path = path.into();
        if path.file_name().is_none() {
            return Err(LoggerError::config(
                "RotateConfig",
                format!("'{}' is not a file path", path.display()),
            ));
        }
        ensure_parent_dir(&path)?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
        let compressor = if policy.compress {
            Some(Compressor::spawn(on_error.clone())?)
        } else {
            None
        };

        Ok(Self {
            path,
            stem,
            ext,
            policy,
            state: Mutex::new(ActiveFile {
                file: None,
                size: 0,
                last_backup: None,
            }),
            compressor,
            on_error,
        })
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Bytes written to the active file
    pub fn current_size(&self) -> u64 {
        self.state.lock().size
    }

    /// Rotate now, regardless of size
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.rotate_locked(&mut state)
    }

    fn open_active(&self, state: &mut ActiveFile) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LoggerError::file_sink(self.path.display().to_string(), format!("Failed to open: {}", e))
            })?;
        state.size = file.metadata().map(|m| m.len()).unwrap_or(0);
        state.file = Some(file);
        Ok(())
    }

    fn rotate_locked(&self, state: &mut ActiveFile) -> Result<()> {
        state.file = None;

        if self.path.exists() {
            let (backup, time) = self.next_backup_name(state.last_backup);
            fs::rename(&self.path, &backup).map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;
            state.last_backup = Some(time);
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to create new log file: {}", e),
                )
            })?;
        state.file = Some(file);
        state.size = 0;

        self.enforce_retention();
        Ok(())
    }

    fn backup_path(&self, time: NaiveDateTime) -> PathBuf {
        let stamp = time.format(BACKUP_TIME_FORMAT);
        let name = match &self.ext {
            Some(ext) => format!("{}.{}.{}", self.stem, stamp, ext),
            None => format!("{}.{}", self.stem, stamp),
        };
        self.path.with_file_name(name)
    }

    /// Current UTC time, moved past the previous backup and past any name
    /// already taken on disk, so backup times strictly increase.
    fn next_backup_name(&self, last: Option<NaiveDateTime>) -> (PathBuf, NaiveDateTime) {
        let step = ChronoDuration::milliseconds(1);
        let mut time = truncate_millis(Utc::now().naive_utc());
        if let Some(last) = last {
            if time <= last {
                time = last + step;
            }
        }
        loop {
            let candidate = self.backup_path(time);
            if !candidate.exists() && !gz_path(&candidate).exists() {
                return (candidate, time);
            }
            time += step;
        }
    }

    fn parse_backup(&self, name: &str) -> Option<(NaiveDateTime, bool)> {
        let (name, compressed) = match name.strip_suffix(".gz") {
            Some(rest) => (rest, true),
            None => (name, false),
        };
        let rest = name.strip_prefix(self.stem.as_str())?.strip_prefix('.')?;
        let stamp = match &self.ext {
            Some(ext) => rest.strip_suffix(ext.as_str())?.strip_suffix('.')?,
            None => rest,
        };
        NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT)
            .ok()
            .map(|time| (time, compressed))
    }

    /// Backups of this file, newest first. A backup present both plain and
    /// compressed is listed once, as the plain file.
    pub fn backups(&self) -> Result<Vec<Backup>> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };

        let mut found: Vec<Backup> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some((time, compressed)) = self.parse_backup(&name.to_string_lossy()) else {
                continue;
            };
            found.push(Backup {
                path: entry.path(),
                time,
                compressed,
            });
        }

        found.sort_by(|a, b| b.time.cmp(&a.time).then(a.compressed.cmp(&b.compressed)));
        found.dedup_by(|later, earlier| later.time == earlier.time);
        Ok(found)
    }

    fn enforce_retention(&self) {
        let backups = match self.backups() {
            Ok(backups) => backups,
            Err(e) => {
                (self.on_error)(&e);
                return;
            }
        };

        let cutoff = (!self.policy.max_age.is_zero())
            .then(|| ChronoDuration::from_std(self.policy.max_age).ok())
            .flatten()
            .map(|age| Utc::now().naive_utc() - age);

        let mut kept = Vec::new();
        for backup in backups {
            if self.is_discarded(&backup) {
                continue;
            }
            let expired = cutoff.map_or(false, |cutoff| backup.time < cutoff);
            let over_count = self.policy.max_backups > 0 && kept.len() >= self.policy.max_backups;
            if expired || over_count {
                self.remove_backup(&backup);
            } else {
                kept.push(backup);
            }
        }

        if let Some(compressor) = &self.compressor {
            for backup in kept.into_iter().filter(|b| !b.compressed) {
                compressor.submit(backup.path);
            }
        }
    }

    fn is_discarded(&self, backup: &Backup) -> bool {
        self.compressor
            .as_ref()
            .map_or(false, |c| c.is_discarded(&plain_path(backup)))
    }

    fn remove_backup(&self, backup: &Backup) {
        let plain = plain_path(backup);
        if self.compressor.as_ref().map_or(false, |c| c.discard(&plain)) {
            // The worker deletes it when its job ends.
            return;
        }
        for path in [plain.clone(), gz_path(&plain)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => (self.on_error)(&LoggerError::file_rotation(
                    path.display().to_string(),
                    format!("Failed to remove old backup: {}", e),
                )),
            }
        }
    }
}

fn plain_path(backup: &Backup) -> PathBuf {
    if backup.compressed {
        backup.path.with_extension("")
    } else {
        backup.path.clone()
    }
}

fn truncate_millis(time: NaiveDateTime) -> NaiveDateTime {
    time.with_nanosecond(time.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(time)
}

impl LogWriter for RotatingWriter {
    fn write_record(&self, buf: &[u8]) -> Result<()> {
        let len = buf.len() as u64;
        if len > self.policy.max_size {
            return Err(LoggerError::file_rotation(
                self.path.display().to_string(),
                format!(
                    "write length {} exceeds maximum file size {}",
                    len, self.policy.max_size
                ),
            ));
        }

        let mut state = self.state.lock();
        if state.file.is_none() {
            self.open_active(&mut state)?;
        }
        if state.size + len > self.policy.max_size {
            self.rotate_locked(&mut state)?;
        }

        let Some(file) = state.file.as_mut() else {
            return Err(LoggerError::file_sink(
                self.path.display().to_string(),
                "log file is not open",
            ));
        };
        file.write_all(buf).map_err(|e| {
            LoggerError::file_sink(
                self.path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        state.size += len;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(file) = self.state.lock().file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        self.compressor
            .as_ref()
            .map_or(true, |c| c.wait_idle(timeout))
    }
}

/// Rotating writers for the normal and error files described by `config`
pub fn open_split(config: &RotateConfig, on_error: ErrorHandler) -> Result<SplitSink<RotatingWriter>> {
    let policy = RotationPolicy::from_config(config);
    let normal = RotatingWriter::new(&config.path, policy.clone(), on_error.clone())?;
    let error = RotatingWriter::new(error_path(&config.path, &config.error_suffix), policy, on_error)?;
    Ok(SplitSink::new(normal, error, config.error_level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::stderr_error_handler;
    use tempfile::tempdir;

    fn writer(path: &Path, policy: RotationPolicy) -> RotatingWriter {
        RotatingWriter::new(path, policy, stderr_error_handler()).unwrap()
    }

    #[test]
    fn test_lazy_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/app.log");
        let w = writer(&path, RotationPolicy::default());

        assert!(dir.path().join("logs").is_dir());
        assert!(!path.exists());
        w.write_record(b"first\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");
    }

    #[test]
    fn test_oversized_write_fails() {
        let dir = tempdir().unwrap();
        let policy = RotationPolicy {
            max_size: 8,
            ..RotationPolicy::default()
        };
        let w = writer(&dir.path().join("app.log"), policy);
        assert!(w.write_record(b"0123456789").is_err());
    }

    #[test]
    fn test_parse_backup_names() {
        let dir = tempdir().unwrap();
        let w = writer(&dir.path().join("orders.log"), RotationPolicy::default());

        assert!(w.parse_backup("orders.2024-01-02T15-04-05.123.log").is_some());
        assert_eq!(
            w.parse_backup("orders.2024-01-02T15-04-05.123.log.gz").map(|(_, c)| c),
            Some(true)
        );
        assert!(w.parse_backup("orders.log").is_none());
        assert!(w.parse_backup("orders.err.log").is_none());
        assert!(w.parse_backup("orders.err.2024-01-02T15-04-05.123.log").is_none());
        assert!(w.parse_backup("orders.2024-01-02T15-04-05.123.log.gz.tmp").is_none());
    }

    #[test]
    fn test_backup_times_strictly_increase() {
        let dir = tempdir().unwrap();
        let w = writer(&dir.path().join("app.log"), RotationPolicy::default());

        for _ in 0..4 {
            w.write_record(b"x\n").unwrap();
            w.rotate().unwrap();
        }
        let backups = w.backups().unwrap();
        assert_eq!(backups.len(), 4);
        assert!(backups.windows(2).all(|pair| pair[0].time > pair[1].time));
    }

    #[test]
    fn test_backup_names_use_utc() {
        let dir = tempdir().unwrap();
        let w = writer(&dir.path().join("app.log"), RotationPolicy::default());

        let before = truncate_millis(Utc::now().naive_utc());
        w.write_record(b"x\n").unwrap();
        w.rotate().unwrap();
        let after = Utc::now().naive_utc();

        let backups = w.backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].time >= before && backups[0].time <= after);
    }

    #[test]
    fn test_size_counts_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'a'; 90]).unwrap();
        let policy = RotationPolicy {
            max_size: 100,
            ..RotationPolicy::default()
        };
        let w = writer(&path, policy);

        w.write_record(&[b'b'; 20]).unwrap();
        assert_eq!(w.backups().unwrap().len(), 1);
        assert_eq!(w.current_size(), 20);
    }

    #[test]
    fn test_policy_from_config_defaults() {
        let config = RotateConfig::new("app.log");
        let policy = RotationPolicy::from_config(&config);
        assert_eq!(policy.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(policy.max_backups, 0);
        assert!(policy.max_age.is_zero());
    }
}
