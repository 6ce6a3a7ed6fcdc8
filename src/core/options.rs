//! Construction options for a [`Logger`](super::Logger)

use super::context::{default_trace_id, Context};
use super::error::{stderr_error_handler, ErrorHandler};
use super::level::Level;
use crate::engines::EngineKind;
use crate::telemetry::LogExporter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ERROR_SUFFIX: &str = "err";

/// Extracts the trace id attached to each record from the call context
pub type TraceIdFn = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// Primary output stream shared by every handle derived from one logger
#[derive(Clone)]
pub struct Output(Arc<Mutex<Box<dyn Write + Send>>>);

impl Output {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Output(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write one encoded record with a single call
    pub fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        self.0.lock().write_all(buf)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Output")
    }
}

/// Split local files: `path` for normal records, the derived error path for
/// records at or above `error_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFsConfig {
    pub path: PathBuf,
    #[serde(default = "default_error_level")]
    pub error_level: Level,
    #[serde(default = "default_error_suffix")]
    pub error_suffix: String,
}

impl LocalFsConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            error_level: default_error_level(),
            error_suffix: default_error_suffix(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_error_level(mut self, level: Level) -> Self {
        self.error_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_error_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.error_suffix = suffix.into();
        self
    }
}

/// Split rotated files. A zero `max_size_kb` means the default size,
/// zero `max_backups` or `max_age` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub max_size_kb: u64,
    #[serde(default)]
    pub max_backups: usize,
    #[serde(default, rename = "max_age_secs", with = "duration_secs")]
    pub max_age: Duration,
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_error_level")]
    pub error_level: Level,
    #[serde(default = "default_error_suffix")]
    pub error_suffix: String,
}

impl RotateConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_kb: 0,
            max_backups: 0,
            max_age: Duration::ZERO,
            compress: false,
            error_level: default_error_level(),
            error_suffix: default_error_suffix(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_size_kb(mut self, kb: u64) -> Self {
        self.max_size_kb = kb;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_error_level(mut self, level: Level) -> Self {
        self.error_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_error_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.error_suffix = suffix.into();
        self
    }
}

fn default_error_level() -> Level {
    Level::Error
}

fn default_error_suffix() -> String {
    DEFAULT_ERROR_SUFFIX.to_string()
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Everything an engine needs at construction
#[derive(Clone)]
pub struct Options {
    pub engine: EngineKind,
    pub level: Level,
    pub output: Output,
    pub service_name: String,
    pub caller: bool,
    pub caller_skip: usize,
    pub timestamp: bool,
    pub local_fs: Option<LocalFsConfig>,
    pub rotate: Option<RotateConfig>,
    pub trace_id_fn: Option<TraceIdFn>,
    pub telemetry: bool,
    pub exporter: Option<Arc<dyn LogExporter>>,
    pub error_handler: ErrorHandler,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            level: Level::Info,
            output: Output::stdout(),
            service_name: String::new(),
            caller: true,
            caller_skip: 0,
            timestamp: true,
            local_fs: None,
            rotate: None,
            trace_id_fn: Some(Arc::new(default_trace_id)),
            telemetry: false,
            exporter: None,
            error_handler: stderr_error_handler(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("engine", &self.engine)
            .field("level", &self.level)
            .field("service_name", &self.service_name)
            .field("caller", &self.caller)
            .field("caller_skip", &self.caller_skip)
            .field("timestamp", &self.timestamp)
            .field("local_fs", &self.local_fs)
            .field("rotate", &self.rotate)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

/// Plain-data logger configuration, for embedding in application config
/// files. Writers, callbacks and exporters are set on the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub engine: EngineKind,
    pub level: Level,
    pub service_name: String,
    pub caller: bool,
    pub caller_skip: usize,
    pub timestamp: bool,
    pub local_fs: Option<LocalFsConfig>,
    pub rotate: Option<RotateConfig>,
    pub telemetry: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            level: Level::Info,
            service_name: String::new(),
            caller: true,
            caller_skip: 0,
            timestamp: true,
            local_fs: None,
            rotate: None,
            telemetry: false,
        }
    }
}

impl LoggerConfig {
    pub fn into_builder(self) -> super::logger::LoggerBuilder {
        let mut builder = super::logger::LoggerBuilder::new()
            .engine(self.engine)
            .level(self.level)
            .service_name(self.service_name)
            .caller(self.caller)
            .caller_skip(self.caller_skip)
            .timestamp(self.timestamp)
            .telemetry(self.telemetry);
        if let Some(local_fs) = self.local_fs {
            builder = builder.local_fs(local_fs);
        }
        if let Some(rotate) = self.rotate {
            builder = builder.rotate(rotate);
        }
        builder
    }
}
