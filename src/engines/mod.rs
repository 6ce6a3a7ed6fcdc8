//! Backend engines
//!
//! Each engine adapts a different logging-engine style behind [`Engine`]:
//! its own native level scale, its own encoder and its own internal call
//! chain. They all write the same field names, so a consumer cannot tell
//! from a record's shape which engine produced it.

pub mod core;
pub mod event;
pub mod handler;
pub mod hook;

pub use self::core::CoreEngine;
pub use event::EventEngine;
pub use handler::HandlerEngine;
pub use hook::HookEngine;

use crate::core::error::{ErrorHandler, LoggerError, Result};
use crate::core::frame::FrameResolver;
use crate::core::options::{Options, Output};
use crate::core::record::{Fields, Record};
use crate::core::Level;
use crate::stages::Pipeline;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Entry plus hook chain
    Hook,
    /// Level-checked core with a streaming encoder
    #[default]
    Core,
    /// Handler receiving attribute lists
    Handler,
    /// Event builder over an append-only buffer
    Event,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Hook,
        EngineKind::Core,
        EngineKind::Handler,
        EngineKind::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Hook => "hook",
            EngineKind::Core => "core",
            EngineKind::Handler => "handler",
            EngineKind::Event => "event",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        EngineKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LoggerError::config("engine", format!("unsupported engine: {}", s)))
    }
}

pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn enabled(&self, level: Level) -> bool;

    /// New engine carrying `fields` on top of this one's
    fn with_fields(&self, fields: &Fields) -> Arc<dyn Engine>;

    /// New engine carrying `error`
    fn with_error(&self, error: String) -> Arc<dyn Engine>;

    /// Run the pipeline and the terminal write for one record
    fn dispatch(&self, record: Record) -> Result<()>;

    /// Flush the primary output and file sinks, then wait up to `timeout`
    /// for background compression
    fn flush(&self, timeout: Duration) -> Result<()>;

    fn error_handler(&self) -> &ErrorHandler;
}

/// State shared by an engine and every engine derived from it
pub struct Shared {
    pub pipeline: Pipeline,
    pub output: Output,
    pub on_error: ErrorHandler,
}

impl Shared {
    pub fn new(options: &Options, depth: usize, scope: &'static str) -> Result<Arc<Self>> {
        let resolver = FrameResolver::new(depth, options.caller_skip);
        Ok(Arc::new(Self {
            pipeline: Pipeline::from_options(options, resolver, scope)?,
            output: options.output.clone(),
            on_error: options.error_handler.clone(),
        }))
    }

    /// Terminal write to the primary output
    pub fn write_terminal(&self, buf: &[u8]) -> Result<()> {
        self.output
            .write_record(buf)
            .map_err(|e| LoggerError::io_operation("writing primary output", "terminal write failed", e))
    }

    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let output = self.output.flush().map_err(LoggerError::from);
        let sinks = self.pipeline.flush();
        if !self.pipeline.wait_idle(timeout) {
            eprintln!(
                "[LOGGER WARNING] Background compression still running after {:?}",
                timeout
            );
        }
        output.and(sinks)
    }
}

/// Combine the pipeline result with the terminal result; a pipeline failure
/// takes precedence and a terminal failure behind it is reported directly.
pub(crate) fn settle(shared: &Shared, staged: Result<()>, terminal: Result<()>) -> Result<()> {
    match (staged, terminal) {
        (Err(staged), Err(terminal)) => {
            (shared.on_error)(&terminal);
            Err(staged)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

/// Construct the engine selected in `options`
pub fn build(options: &Options) -> Result<Arc<dyn Engine>> {
    let engine: Arc<dyn Engine> = match options.engine {
        EngineKind::Hook => Arc::new(HookEngine::new(options)?),
        EngineKind::Core => Arc::new(CoreEngine::new(options)?),
        EngineKind::Handler => Arc::new(HandlerEngine::new(options)?),
        EngineKind::Event => Arc::new(EventEngine::new(options)?),
    };
    Ok(engine)
}
