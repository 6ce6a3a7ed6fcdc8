//! Telemetry bridge: log records mapped onto the OpenTelemetry log data
//! model and handed to an exporter

use crate::core::context::Context;
use crate::core::error::{LoggerError, Result};
use crate::core::record::{Record, FIELD_KEY_ERROR};
use crate::core::Level;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;

/// OpenTelemetry severity number of a level. Fatal and Panic share a bucket.
pub fn severity_number(level: Level) -> u8 {
    match level {
        Level::Trace => 1,
        Level::Debug => 5,
        Level::Info => 9,
        Level::Warn => 13,
        Level::Error => 17,
        Level::Fatal | Level::Panic => 21,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Instrumentation scope, the name of the engine that produced the record
    pub scope: &'static str,
    pub timestamp: DateTime<Utc>,
    pub severity_number: u8,
    pub severity_text: String,
    pub event_name: String,
    pub body: String,
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

impl TelemetryRecord {
    pub fn from_record(scope: &'static str, record: &Record) -> Self {
        let mut attributes: Vec<(String, String)> = record
            .wire_fields()
            .map(|(key, value)| (key.into_owned(), attribute_text(value)))
            .collect();
        if let Some(error) = &record.error {
            attributes.push((FIELD_KEY_ERROR.to_string(), error.clone()));
        }

        let span = record.context.span_context().filter(|s| s.is_valid());
        Self {
            scope,
            timestamp: record.time.with_timezone(&Utc),
            severity_number: severity_number(record.level),
            severity_text: record.level.as_str().to_string(),
            event_name: record.level.as_str().to_string(),
            body: record.message.clone(),
            attributes,
            trace_id: span.map(|s| s.trace_id.to_string()),
            span_id: span.map(|s| s.span_id.to_string()),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn attribute_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Destination of telemetry records
pub trait LogExporter: Send + Sync {
    fn export(&self, ctx: &Context, record: TelemetryRecord) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Discards everything; the process-wide exporter until one is installed
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExporter;

impl LogExporter for NoopExporter {
    fn export(&self, _ctx: &Context, _record: TelemetryRecord) -> Result<()> {
        Ok(())
    }
}

/// Writes each telemetry record as one JSON line
pub struct JsonLinesExporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesExporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> LogExporter for JsonLinesExporter<W> {
    fn export(&self, _ctx: &Context, record: TelemetryRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.writer
            .lock()
            .write_all(&line)
            .map_err(|e| LoggerError::export(e.to_string()))
    }

    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| LoggerError::export(e.to_string()))
    }
}

static GLOBAL_EXPORTER: Lazy<ArcSwap<Arc<dyn LogExporter>>> =
    Lazy::new(|| ArcSwap::from_pointee(Arc::new(NoopExporter) as Arc<dyn LogExporter>));

/// Install the exporter used by loggers built without their own
pub fn set_global_exporter(exporter: Arc<dyn LogExporter>) {
    GLOBAL_EXPORTER.store(Arc::new(exporter));
}

pub fn global_exporter() -> Arc<dyn LogExporter> {
    Arc::clone(&GLOBAL_EXPORTER.load())
}
