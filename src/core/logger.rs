//! Logger facade and builder

use super::{
    context::Context,
    error::{ErrorHandler, LoggerError, Result},
    level::Level,
    options::{LocalFsConfig, LoggerConfig, Options, Output, RotateConfig},
    record::{render_error, Fields, Record},
};
use crate::engines::{self, Engine, EngineKind};
use crate::telemetry::LogExporter;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::io::Write;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

/// How long `fatal*` and [`Logger::flush`] wait for background compression
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap, immutable logging handle.
///
/// `with_*` derivations return a new handle; the one they were called on
/// keeps its state. Clones and derivations share the engine's outputs and
/// file sinks.
#[derive(Clone)]
pub struct Logger {
    engine: Arc<dyn Engine>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("engine", &self.engine.kind())
            .finish()
    }
}

impl Default for Logger {
    /// Core engine, Info level, standard output
    fn default() -> Self {
        match LoggerBuilder::new().build() {
            Ok(logger) => logger,
            Err(e) => unreachable!("default options open no files: {}", e),
        }
    }
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn from_config(config: LoggerConfig) -> Result<Self> {
        config.into_builder().build()
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.engine.enabled(level)
    }

    #[must_use]
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<Value>) -> Logger {
        let mut fields = Fields::new();
        fields.insert(key.into(), value.into());
        self.with_fields(fields)
    }

    /// Later keys win over keys already carried by this handle
    #[must_use]
    pub fn with_fields<I, K, V>(&self, fields: I) -> Logger
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields: Fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Logger {
            engine: self.engine.with_fields(&fields),
        }
    }

    /// Attach `err`, rendered with its source chain, as the `error` field
    #[must_use]
    pub fn with_error(&self, err: &(dyn StdError + 'static)) -> Logger {
        Logger {
            engine: self.engine.with_error(render_error(err)),
        }
    }

    #[track_caller]
    pub fn log(&self, ctx: &Context, level: Level, msg: impl fmt::Display) {
        self.log_at(ctx, level, &msg, Location::caller());
    }

    #[track_caller]
    pub fn logf(&self, ctx: &Context, level: Level, args: fmt::Arguments<'_>) {
        self.log_at(ctx, level, &args, Location::caller());
    }

    /// Operands are joined with single spaces
    #[track_caller]
    pub fn logln(&self, ctx: &Context, level: Level, args: &[&dyn fmt::Display]) {
        self.log_at(ctx, level, &Operands(args), Location::caller());
    }

    /// Flush the primary output and every file sink, then wait up to
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`] for pending compression
    pub fn flush(&self) -> Result<()> {
        self.engine.flush(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    fn log_at(
        &self,
        ctx: &Context,
        level: Level,
        msg: &dyn fmt::Display,
        call_site: &'static Location<'static>,
    ) {
        if !self.engine.enabled(level) {
            return;
        }
        self.emit(ctx, level, msg.to_string(), call_site);
    }

    #[inline(never)]
    fn emit(&self, ctx: &Context, level: Level, message: String, call_site: &'static Location<'static>) {
        let record = Record::new(level, message, ctx, call_site);
        if let Err(e) = self.engine.dispatch(record) {
            (self.engine.error_handler())(&e);
        }
    }

    /// Write (when enabled) and then end the process or unwind
    fn terminate(
        &self,
        ctx: &Context,
        level: Level,
        msg: &dyn fmt::Display,
        call_site: &'static Location<'static>,
    ) -> ! {
        let message = msg.to_string();
        if self.engine.enabled(level) {
            self.emit(ctx, level, message.clone(), call_site);
        }

        if level == Level::Panic {
            if let Err(e) = self.engine.flush(Duration::ZERO) {
                (self.engine.error_handler())(&e);
            }
            panic!("{}", message);
        }

        if let Err(e) = self.flush() {
            (self.engine.error_handler())(&e);
        }
        std::process::exit(1)
    }
}

struct Operands<'a>(&'a [&'a dyn fmt::Display]);

impl fmt::Display for Operands<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

/// Plain, formatted and space-joined writers for one level
macro_rules! level_methods {
    ($($level:expr => $plain:ident, $formatted:ident, $joined:ident;)*) => {
        impl Logger {
            $(
                #[track_caller]
                pub fn $plain(&self, ctx: &Context, msg: impl fmt::Display) {
                    self.log_at(ctx, $level, &msg, Location::caller());
                }

                #[track_caller]
                pub fn $formatted(&self, ctx: &Context, args: fmt::Arguments<'_>) {
                    self.log_at(ctx, $level, &args, Location::caller());
                }

                #[track_caller]
                pub fn $joined(&self, ctx: &Context, args: &[&dyn fmt::Display]) {
                    self.log_at(ctx, $level, &Operands(args), Location::caller());
                }
            )*
        }
    };
}

level_methods! {
    Level::Trace => trace, tracef, traceln;
    Level::Debug => debug, debugf, debugln;
    Level::Info => info, infof, infoln;
    Level::Warn => warn, warnf, warnln;
    Level::Warn => warning, warningf, warningln;
    Level::Info => print, printf, println;
    Level::Error => error, errorf, errorln;
}

/// Writers that end the process (`fatal*`) or unwind (`panic*`)
macro_rules! terminal_methods {
    ($($level:expr => $plain:ident, $formatted:ident, $joined:ident;)*) => {
        impl Logger {
            $(
                #[track_caller]
                pub fn $plain(&self, ctx: &Context, msg: impl fmt::Display) -> ! {
                    self.terminate(ctx, $level, &msg, Location::caller())
                }

                #[track_caller]
                pub fn $formatted(&self, ctx: &Context, args: fmt::Arguments<'_>) -> ! {
                    self.terminate(ctx, $level, &args, Location::caller())
                }

                #[track_caller]
                pub fn $joined(&self, ctx: &Context, args: &[&dyn fmt::Display]) -> ! {
                    self.terminate(ctx, $level, &Operands(args), Location::caller())
                }
            )*
        }
    };
}

terminal_methods! {
    Level::Fatal => fatal, fatalf, fatalln;
    Level::Panic => panic, panicf, panicln;
}

/// Builder for constructing a [`Logger`]
///
/// # Example
/// ```no_run
/// use rust_log_pipeline::prelude::*;
///
/// let logger = Logger::builder()
///     .engine(EngineKind::Handler)
///     .level(Level::Debug)
///     .service_name("checkout")
///     .local_fs(LocalFsConfig::new("logs/orders.log"))
///     .build()
///     .unwrap();
/// logger.info(&Context::background(), "order placed");
/// ```
#[derive(Debug, Default)]
pub struct LoggerBuilder {
    options: Options,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.options.engine = engine;
        self
    }

    /// Minimum level; records below it are dropped before any enrichment
    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: Level) -> Self {
        self.options.level = level;
        self
    }

    /// Primary output, standard output by default
    #[must_use = "builder methods return a new value"]
    pub fn output<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.options.output = Output::new(writer);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.options.service_name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn caller(mut self, enabled: bool) -> Self {
        self.options.caller = enabled;
        self
    }

    /// Extra frames to skip when the facade is wrapped in helpers.
    ///
    /// Each helper function counts once, inlined or not. Without line
    /// tables (`debug = 0`) the skip cannot be applied and the caller is
    /// the helper's call into the facade.
    #[must_use = "builder methods return a new value"]
    pub fn caller_skip(mut self, skip: usize) -> Self {
        self.options.caller_skip = skip;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn timestamp(mut self, enabled: bool) -> Self {
        self.options.timestamp = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn local_fs(mut self, config: LocalFsConfig) -> Self {
        self.options.local_fs = Some(config);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn rotate(mut self, config: RotateConfig) -> Self {
        self.options.rotate = Some(config);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn trace_id_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        self.options.trace_id_fn = Some(Arc::new(f));
        self
    }

    /// Turn off trace id enrichment
    #[must_use = "builder methods return a new value"]
    pub fn without_trace_id(mut self) -> Self {
        self.options.trace_id_fn = None;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn telemetry(mut self, enabled: bool) -> Self {
        self.options.telemetry = enabled;
        self
    }

    /// Exporter for the telemetry bridge. Without one the process-wide
    /// exporter is used.
    #[must_use = "builder methods return a new value"]
    pub fn exporter(mut self, exporter: Arc<dyn LogExporter>) -> Self {
        self.options.exporter = Some(exporter);
        self
    }

    /// Receives every failure the logger swallows
    #[must_use = "builder methods return a new value"]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LoggerError) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        self.options.error_handler = handler;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Build the logger. Fails when a local file cannot be opened or a log
    /// directory cannot be created.
    pub fn build(self) -> Result<Logger> {
        Ok(Logger {
            engine: engines::build(&self.options)?,
        })
    }
}
