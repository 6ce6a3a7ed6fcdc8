//! Core engine: a level check hands the entry to a write step that streams
//! it through a map serializer.

use super::{settle, Engine, EngineKind, Shared};
use crate::core::error::{ErrorHandler, Result};
use crate::core::options::Options;
use crate::core::record::{
    Fields, Record, FIELD_KEY_ERROR, FIELD_KEY_LEVEL, FIELD_KEY_MSG, FIELD_KEY_TIME,
};
use crate::core::Level;
use crate::stages::Encoder;
use serde::ser::{SerializeMap, Serializer};
use std::sync::Arc;
use std::time::Duration;

/// Frames between the stack walk and `dispatch`: the walk, the caller
/// stage, `write_entry` and `check`.
pub const CALLER_DEPTH: usize = 4;

/// Native scale; the gap below Fatal is kept free for development panics
pub fn native_level(level: Level) -> i8 {
    match level {
        Level::Trace => -2,
        Level::Debug => -1,
        Level::Info => 0,
        Level::Warn => 1,
        Level::Error => 2,
        Level::Fatal => 5,
        Level::Panic => 6,
    }
}

/// Streams `level`, `time`, `msg`, the fields and the error straight into
/// the output buffer
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamEncoder;

impl Encoder for StreamEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        {
            let mut ser = serde_json::Serializer::new(&mut buf);
            let mut map = ser.serialize_map(None)?;
            map.serialize_entry(FIELD_KEY_LEVEL, record.level.as_str())?;
            map.serialize_entry(FIELD_KEY_TIME, &record.time_text())?;
            map.serialize_entry(FIELD_KEY_MSG, &record.message)?;
            for (key, value) in record.wire_fields() {
                map.serialize_entry(key.as_ref(), value)?;
            }
            if let Some(error) = &record.error {
                map.serialize_entry(FIELD_KEY_ERROR, error)?;
            }
            map.end()?;
        }
        buf.push(b'\n');
        Ok(buf)
    }
}

#[derive(Clone)]
pub struct CoreEngine {
    shared: Arc<Shared>,
    level: i8,
    fields: Fields,
    error: Option<String>,
}

impl CoreEngine {
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            shared: Shared::new(options, CALLER_DEPTH, EngineKind::Core.as_str())?,
            level: native_level(options.level),
            fields: Fields::new(),
            error: None,
        })
    }

    #[inline(never)]
    fn check(&self, record: Record) -> Result<()> {
        if native_level(record.level) < self.level {
            return Ok(());
        }
        self.write_entry(record)
    }

    #[inline(never)]
    fn write_entry(&self, record: Record) -> Result<()> {
        let mut entry = record.with_fields(&self.fields).with_error(self.error.as_deref());
        let staged = self.shared.pipeline.run(&mut entry, &StreamEncoder);
        let terminal = StreamEncoder
            .encode(&entry)
            .and_then(|buf| self.shared.write_terminal(&buf));
        settle(&self.shared, staged, terminal)
    }
}

impl Engine for CoreEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Core
    }

    fn enabled(&self, level: Level) -> bool {
        native_level(level) >= self.level
    }

    fn with_fields(&self, fields: &Fields) -> Arc<dyn Engine> {
        let mut next = self.clone();
        next.fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Arc::new(next)
    }

    fn with_error(&self, error: String) -> Arc<dyn Engine> {
        let mut next = self.clone();
        next.error = Some(error);
        Arc::new(next)
    }

    fn dispatch(&self, record: Record) -> Result<()> {
        self.check(record)
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.flush(timeout)
    }

    fn error_handler(&self) -> &ErrorHandler {
        &self.shared.on_error
    }
}
