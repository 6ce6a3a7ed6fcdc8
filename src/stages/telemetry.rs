//! Telemetry bridge stage

use super::{Encoder, Stage};
use crate::core::error::{ErrorHandler, LoggerError, Result};
use crate::core::record::Record;
use crate::telemetry::{LogExporter, TelemetryRecord};
use std::sync::Arc;

/// Exports every record through a [`LogExporter`]. Export failures never
/// reach the caller; each one is reported to the error handler.
pub struct TelemetryStage {
    scope: &'static str,
    exporter: Arc<dyn LogExporter>,
    on_error: ErrorHandler,
}

impl TelemetryStage {
    pub fn new(scope: &'static str, exporter: Arc<dyn LogExporter>, on_error: ErrorHandler) -> Self {
        Self {
            scope,
            exporter,
            on_error,
        }
    }
}

impl Stage for TelemetryStage {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn apply(&self, record: &mut Record, _encoder: &dyn Encoder) -> Result<()> {
        let telemetry = TelemetryRecord::from_record(self.scope, record);
        if let Err(e) = self.exporter.export(&record.context, telemetry) {
            (self.on_error)(&LoggerError::stage(self.name(), record.level, e));
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Err(e) = self.exporter.flush() {
            (self.on_error)(&e);
        }
        Ok(())
    }
}
