//! Process-wide default logger
//!
//! The default is built on first use (Core engine, Info level, standard
//! output) and can be swapped at any time. A swap is atomic: concurrent
//! callers see either the previous logger or the new one, and two separate
//! calls may see different loggers.

use super::context::Context;
use super::error::Result;
use super::level::Level;
use super::logger::{Logger, LoggerBuilder};
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

static DEFAULT_LOGGER: Lazy<ArcSwap<Logger>> = Lazy::new(|| ArcSwap::from_pointee(Logger::default()));

/// Current default logger
pub fn logger() -> Logger {
    Logger::clone(&DEFAULT_LOGGER.load())
}

/// Replace the default logger
pub fn reset_logger(logger: Logger) {
    DEFAULT_LOGGER.store(Arc::new(logger));
}

/// Build a logger, install it as the default and return it. On error the
/// current default stays in place.
pub fn reset_logger_with(builder: LoggerBuilder) -> Result<Logger> {
    let logger = builder.build()?;
    reset_logger(logger.clone());
    Ok(logger)
}

pub fn with_field(key: impl Into<String>, value: impl Into<Value>) -> Logger {
    logger().with_field(key, value)
}

pub fn with_fields<I, K, V>(fields: I) -> Logger
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    logger().with_fields(fields)
}

pub fn with_error(err: &(dyn StdError + 'static)) -> Logger {
    logger().with_error(err)
}

#[track_caller]
pub fn log(ctx: &Context, level: Level, msg: impl fmt::Display) {
    logger().log(ctx, level, msg)
}

#[track_caller]
pub fn logf(ctx: &Context, level: Level, args: fmt::Arguments<'_>) {
    logger().logf(ctx, level, args)
}

#[track_caller]
pub fn logln(ctx: &Context, level: Level, args: &[&dyn fmt::Display]) {
    logger().logln(ctx, level, args)
}

macro_rules! delegate {
    ($($plain:ident, $formatted:ident, $joined:ident;)*) => {
        $(
            #[track_caller]
            pub fn $plain(ctx: &Context, msg: impl fmt::Display) {
                logger().$plain(ctx, msg)
            }

            #[track_caller]
            pub fn $formatted(ctx: &Context, args: fmt::Arguments<'_>) {
                logger().$formatted(ctx, args)
            }

            #[track_caller]
            pub fn $joined(ctx: &Context, args: &[&dyn fmt::Display]) {
                logger().$joined(ctx, args)
            }
        )*
    };
}

delegate! {
    trace, tracef, traceln;
    debug, debugf, debugln;
    info, infof, infoln;
    warn, warnf, warnln;
    warning, warningf, warningln;
    print, printf, println;
    error, errorf, errorln;
}

macro_rules! delegate_terminal {
    ($($plain:ident, $formatted:ident, $joined:ident;)*) => {
        $(
            #[track_caller]
            pub fn $plain(ctx: &Context, msg: impl fmt::Display) -> ! {
                logger().$plain(ctx, msg)
            }

            #[track_caller]
            pub fn $formatted(ctx: &Context, args: fmt::Arguments<'_>) -> ! {
                logger().$formatted(ctx, args)
            }

            #[track_caller]
            pub fn $joined(ctx: &Context, args: &[&dyn fmt::Display]) -> ! {
                logger().$joined(ctx, args)
            }
        )*
    };
}

delegate_terminal! {
    fatal, fatalf, fatalln;
    panic, panicf, panicln;
}
