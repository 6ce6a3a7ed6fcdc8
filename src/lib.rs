//! # Rust Log Pipeline
//!
//! A structured logging facade in front of four interchangeable backend
//! engines. Every record runs through an ordered pipeline of enrichment
//! stages and sinks before the engine writes it to its primary output.
//!
//! ## Features
//!
//! - **One facade, four engines**: hook, core, handler and event styles,
//!   chosen at construction
//! - **Enrichment**: caller location, Unix timestamp, service name, trace id
//! - **Split sinks**: normal/error local files and size-rotated archives with
//!   age and count retention and background gzip compression
//! - **Telemetry bridge**: records mapped to OpenTelemetry severities and
//!   handed to a pluggable exporter
//! - **Process-wide default** logger with atomic replacement

pub mod core;
pub mod engines;
pub mod macros;
pub mod sinks;
pub mod stages;
pub mod telemetry;

pub mod prelude {
    pub use crate::core::global;
    pub use crate::core::{
        Context, Fields, Level, LocalFsConfig, Logger, LoggerBuilder, LoggerConfig, LoggerError,
        Record, Result, RotateConfig, SpanContext, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::engines::EngineKind;
    pub use crate::telemetry::{LogExporter, TelemetryRecord};
}

pub use crate::core::global::{logger, reset_logger, reset_logger_with};
pub use crate::core::{
    Context, ErrorHandler, Fields, Level, LocalFsConfig, Logger, LoggerBuilder, LoggerConfig,
    LoggerError, Record, Result, RotateConfig, SpanContext, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::engines::{Engine, EngineKind};
pub use crate::telemetry::{set_global_exporter, LogExporter, TelemetryRecord};
