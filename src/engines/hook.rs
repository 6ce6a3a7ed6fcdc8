//! Hook engine: an entry is built, the hook chain fires, then the formatter
//! renders the entry for the primary output.

use super::{settle, Engine, EngineKind, Shared};
use crate::core::error::{ErrorHandler, Result};
use crate::core::options::Options;
use crate::core::record::{
    Fields, Record, FIELD_KEY_ERROR, FIELD_KEY_LEVEL, FIELD_KEY_MSG, FIELD_KEY_TIME,
};
use crate::core::Level;
use crate::stages::Encoder;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Frames between the stack walk and `dispatch`: the walk, the caller
/// stage and `fire_hooks`.
pub const CALLER_DEPTH: usize = 3;

/// Native scale: lower is more severe
pub fn native_level(level: Level) -> u8 {
    match level {
        Level::Panic => 0,
        Level::Fatal => 1,
        Level::Error => 2,
        Level::Warn => 3,
        Level::Info => 4,
        Level::Debug => 5,
        Level::Trace => 6,
    }
}

/// Renders through a `serde_json::Map`, so keys come out sorted
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl Encoder for JsonFormatter {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut data = Map::new();
        for (key, value) in record.wire_fields() {
            data.insert(key.into_owned(), value.clone());
        }
        if let Some(error) = &record.error {
            data.insert(FIELD_KEY_ERROR.into(), Value::String(error.clone()));
        }
        data.insert(FIELD_KEY_TIME.into(), Value::String(record.time_text()));
        data.insert(FIELD_KEY_MSG.into(), Value::String(record.message.clone()));
        data.insert(FIELD_KEY_LEVEL.into(), Value::String(record.level.as_str().into()));

        let mut buf = serde_json::to_vec(&data)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

#[derive(Clone)]
pub struct HookEngine {
    shared: Arc<Shared>,
    level: u8,
    fields: Fields,
    error: Option<String>,
}

impl HookEngine {
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            shared: Shared::new(options, CALLER_DEPTH, EngineKind::Hook.as_str())?,
            level: native_level(options.level),
            fields: Fields::new(),
            error: None,
        })
    }

    #[inline(never)]
    fn fire_hooks(&self, record: Record) -> Result<()> {
        let mut entry = record.with_fields(&self.fields).with_error(self.error.as_deref());
        let staged = self.shared.pipeline.run(&mut entry, &JsonFormatter);
        let terminal = JsonFormatter
            .encode(&entry)
            .and_then(|buf| self.shared.write_terminal(&buf));
        settle(&self.shared, staged, terminal)
    }
}

impl Engine for HookEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Hook
    }

    fn enabled(&self, level: Level) -> bool {
        native_level(level) <= self.level
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
        if !self.enabled(record.level) {
            return Ok(());
        }
        self.fire_hooks(record)
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.flush(timeout)
    }

    fn error_handler(&self) -> &ErrorHandler {
        &self.shared.on_error
    }
}
