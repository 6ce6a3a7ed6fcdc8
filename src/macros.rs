//! Logging macros with `format!`-style arguments.
//!
//! Each macro takes the logger, the call context and a format string.
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::info;
//!
//! let logger = Logger::builder().output(std::io::sink()).build().unwrap();
//! let ctx = Context::background();
//!
//! info!(logger, &ctx, "Server started");
//!
//! let port = 8080;
//! info!(logger, &ctx, "Server listening on port {}", port);
//! ```

/// Log at an explicit level.
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let logger = Logger::builder().output(std::io::sink()).build().unwrap();
/// # let ctx = Context::background();
/// use rust_log_pipeline::log;
/// log!(logger, &ctx, Level::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $ctx:expr, $level:expr, $($arg:tt)+) => {
        $logger.logf($ctx, $level, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $ctx:expr, $($arg:tt)+) => {
        $logger.tracef($ctx, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $ctx:expr, $($arg:tt)+) => {
        $logger.debugf($ctx, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $ctx:expr, $($arg:tt)+) => {
        $logger.infof($ctx, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $ctx:expr, $($arg:tt)+) => {
        $logger.warnf($ctx, ::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $ctx:expr, $($arg:tt)+) => {
        $logger.errorf($ctx, ::std::format_args!($($arg)+))
    };
}

/// Log at Fatal, flush, and exit the process with status 1.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $ctx:expr, $($arg:tt)+) => {
        $logger.fatalf($ctx, ::std::format_args!($($arg)+))
    };
}
