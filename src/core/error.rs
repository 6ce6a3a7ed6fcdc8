//! Error types for the logging pipeline

use super::level::Level;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, LoggerError>;

/// Callback receiving every failure the pipeline swallows instead of
/// returning to the caller.
pub type ErrorHandler = Arc<dyn Fn(&LoggerError) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File sink error with path
    #[error("File sink error for '{path}': {message}")]
    FileSinkError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// A pipeline stage failed while handling a record
    #[error("Stage '{stage}' failed on {level} record: {source}")]
    StageError {
        stage: &'static str,
        level: Level,
        #[source]
        source: Box<LoggerError>,
    },

    /// Telemetry exporter failure
    #[error("Telemetry export failed: {0}")]
    ExportError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file sink error
    pub fn file_sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileSinkError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the identity of the stage that produced it
    pub fn stage(stage: &'static str, level: Level, source: LoggerError) -> Self {
        LoggerError::StageError {
            stage,
            level,
            source: Box::new(source),
        }
    }

    /// Create a telemetry export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        LoggerError::ExportError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

/// Error handler used when none is configured: one line on stderr.
pub fn stderr_error_handler() -> ErrorHandler {
    Arc::new(|err: &LoggerError| eprintln!("[LOGGER ERROR] {}", err))
}
