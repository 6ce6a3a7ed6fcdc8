//! Handler engine: records become attribute lists handed to a JSON handler

use super::{settle, Engine, EngineKind, Shared};
use crate::core::error::{ErrorHandler, Result};
use crate::core::options::Options;
use crate::core::record::{
    Fields, Record, FIELD_KEY_ERROR, FIELD_KEY_LEVEL, FIELD_KEY_MSG, FIELD_KEY_TIME,
};
use crate::core::Level;
use crate::stages::Encoder;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Frames between the stack walk and `dispatch`: the walk, the caller
/// stage and `handle`.
pub const CALLER_DEPTH: usize = 3;

/// Native scale in steps of four, Info at zero
pub fn native_level(level: Level) -> i8 {
    match level {
        Level::Trace => -8,
        Level::Debug => -4,
        Level::Info => 0,
        Level::Warn => 4,
        Level::Error => 8,
        Level::Fatal => 12,
        Level::Panic => 16,
    }
}

struct Attr<'a> {
    key: Cow<'a, str>,
    value: Cow<'a, Value>,
}

/// One output line: the built-in `time`, `level` and `msg` attributes
/// followed by the record's own
struct HandlerLine<'a> {
    time: String,
    level: &'static str,
    msg: &'a str,
    attrs: Vec<Attr<'a>>,
}

impl<'a> HandlerLine<'a> {
    fn new(record: &'a Record) -> Self {
        let mut attrs: Vec<Attr<'a>> = record
            .wire_fields()
            .map(|(key, value)| Attr {
                key,
                value: Cow::Borrowed(value),
            })
            .collect();
        if let Some(error) = &record.error {
            attrs.push(Attr {
                key: Cow::Borrowed(FIELD_KEY_ERROR),
                value: Cow::Owned(Value::String(error.clone())),
            });
        }
        Self {
            time: record.time_text(),
            level: record.level.as_str(),
            msg: &record.message,
            attrs,
        }
    }
}

impl Serialize for HandlerLine<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.attrs.len()))?;
        map.serialize_entry(FIELD_KEY_TIME, &self.time)?;
        map.serialize_entry(FIELD_KEY_LEVEL, self.level)?;
        map.serialize_entry(FIELD_KEY_MSG, self.msg)?;
        for attr in &self.attrs {
            map.serialize_entry(attr.key.as_ref(), attr.value.as_ref())?;
        }
        map.end()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonHandler;

impl Encoder for JsonHandler {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut buf = serde_json::to_vec(&HandlerLine::new(record))?;
        buf.push(b'\n');
        Ok(buf)
    }
}

#[derive(Clone)]
pub struct HandlerEngine {
    shared: Arc<Shared>,
    level: i8,
    attrs: Fields,
    error: Option<String>,
}

impl HandlerEngine {
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            shared: Shared::new(options, CALLER_DEPTH, EngineKind::Handler.as_str())?,
            level: native_level(options.level),
            attrs: Fields::new(),
            error: None,
        })
    }

    #[inline(never)]
    fn handle(&self, record: Record) -> Result<()> {
        let mut record = record.with_fields(&self.attrs).with_error(self.error.as_deref());
        let staged = self.shared.pipeline.run(&mut record, &JsonHandler);
        let terminal = JsonHandler
            .encode(&record)
            .and_then(|buf| self.shared.write_terminal(&buf));
        settle(&self.shared, staged, terminal)
    }
}

impl Engine for HandlerEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Handler
    }

    fn enabled(&self, level: Level) -> bool {
        native_level(level) >= self.level
    }

    fn with_fields(&self, fields: &Fields) -> Arc<dyn Engine> {
        let mut next = self.clone();
        next.attrs
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
        self.handle(record)
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.flush(timeout)
    }

    fn error_handler(&self) -> &ErrorHandler {
        &self.shared.on_error
    }
}
