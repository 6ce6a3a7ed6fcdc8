//! Enrichment and fan-out stages run by every engine before its own write
//!
//! The pipeline order is fixed when a logger is built:
//!
//! 1. caller, timestamp, service and trace id enrichment
//! 2. local split files, then rotating split files
//! 3. the telemetry bridge
//!
//! The engine performs the terminal write to its primary output afterwards,
//! whatever happened in the stages.

pub mod enrich;
pub mod split;
pub mod telemetry;

pub use enrich::{CallerStage, ServiceStage, TimestampStage, TraceIdStage};
pub use split::SplitSinkStage;
pub use telemetry::TelemetryStage;

use crate::core::error::{ErrorHandler, LoggerError, Result};
use crate::core::frame::FrameResolver;
use crate::core::options::Options;
use crate::core::record::Record;
use crate::sinks::{local, rotating};
use crate::telemetry::global_exporter;
use std::time::{Duration, Instant};

/// Renders a record the way an engine writes it
pub trait Encoder: Send + Sync {
    fn encode(&self, record: &Record) -> Result<Vec<u8>>;
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, record: &mut Record, encoder: &dyn Encoder) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Wait for background work started by this stage
    fn wait_idle(&self, _timeout: Duration) -> bool {
        true
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    on_error: ErrorHandler,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>, on_error: ErrorHandler) -> Self {
        Self { stages, on_error }
    }

    /// Build the stage list for an engine. `scope` names the engine for
    /// the telemetry bridge; `resolver` carries its calibrated depth.
    pub fn from_options(options: &Options, resolver: FrameResolver, scope: &'static str) -> Result<Self> {
        let mut stages: Vec<Box<dyn Stage>> = Vec::new();

        if options.caller {
            stages.push(Box::new(CallerStage::new(resolver)));
        }
        if options.timestamp {
            stages.push(Box::new(TimestampStage));
        }
        if !options.service_name.is_empty() {
            stages.push(Box::new(ServiceStage::new(options.service_name.clone())));
        }
        if let Some(extract) = &options.trace_id_fn {
            stages.push(Box::new(TraceIdStage::new(extract.clone())));
        }
        if let Some(config) = &options.local_fs {
            let sink = local::open_split(config)?;
            stages.push(Box::new(SplitSinkStage::new("local_fs", sink)));
        }
        if let Some(config) = &options.rotate {
            let sink = rotating::open_split(config, options.error_handler.clone())?;
            stages.push(Box::new(SplitSinkStage::new("rotate", sink)));
        }
        if options.telemetry {
            let exporter = options.exporter.clone().unwrap_or_else(global_exporter);
            stages.push(Box::new(TelemetryStage::new(
                scope,
                exporter,
                options.error_handler.clone(),
            )));
        }

        Ok(Self::new(stages, options.error_handler.clone()))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order. A failing stage never stops the ones after
    /// it; the first failure is returned and later ones are reported to the
    /// error handler.
    pub fn run(&self, record: &mut Record, encoder: &dyn Encoder) -> Result<()> {
        let mut first: Option<LoggerError> = None;
        for stage in &self.stages {
            if let Err(e) = stage.apply(record, encoder) {
                let err = LoggerError::stage(stage.name(), record.level, e);
                if first.is_none() {
                    first = Some(err);
                } else {
                    (self.on_error)(&err);
                }
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn flush(&self) -> Result<()> {
        let mut result = Ok(());
        for stage in &self.stages {
            if let Err(e) = stage.flush() {
                if result.is_ok() {
                    result = Err(e);
                } else {
                    (self.on_error)(&e);
                }
            }
        }
        result
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut idle = true;
        for stage in &self.stages {
            idle &= stage.wait_idle(timeout.saturating_sub(start.elapsed()));
        }
        idle
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.on_error
    }
}
