//! Core types: levels, records, context, errors and the logger facade

pub mod context;
pub mod error;
pub mod frame;
pub mod global;
pub mod level;
pub mod logger;
pub mod options;
pub mod record;

pub use context::{default_trace_id, Context, SpanContext, SpanId, TraceId};
pub use error::{stderr_error_handler, ErrorHandler, LoggerError, Result};
pub use frame::FrameResolver;
pub use level::Level;
pub use logger::{Logger, LoggerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use options::{LocalFsConfig, LoggerConfig, Options, Output, RotateConfig, TraceIdFn};
pub use record::{Fields, Record};
