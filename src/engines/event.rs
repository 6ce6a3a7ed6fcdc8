//! Event engine: every record is an event appended field by field to a
//! byte buffer, with the message written last.

use super::{settle, Engine, EngineKind, Shared};
use crate::core::error::{ErrorHandler, Result};
use crate::core::options::Options;
use crate::core::record::{
    Fields, Record, FIELD_KEY_ERROR, FIELD_KEY_LEVEL, FIELD_KEY_MSG, FIELD_KEY_TIME,
};
use crate::core::Level;
use crate::stages::Encoder;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Frames between the stack walk and `dispatch`: the walk, the caller
/// stage and `msg`.
pub const CALLER_DEPTH: usize = 3;

pub fn native_level(level: Level) -> i8 {
    match level {
        Level::Trace => -1,
        Level::Debug => 0,
        Level::Info => 1,
        Level::Warn => 2,
        Level::Error => 3,
        Level::Fatal => 4,
        Level::Panic => 5,
    }
}

/// Append-only JSON object under construction
struct Event {
    buf: Vec<u8>,
    empty: bool,
}

impl Event {
    fn new() -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.push(b'{');
        Self { buf, empty: true }
    }

    fn key(&mut self, key: &str) -> Result<()> {
        if !self.empty {
            self.buf.push(b',');
        }
        self.empty = false;
        serde_json::to_writer(&mut self.buf, key)?;
        self.buf.push(b':');
        Ok(())
    }

    fn field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<&mut Self> {
        self.key(key)?;
        serde_json::to_writer(&mut self.buf, value)?;
        Ok(self)
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"}\n");
        self.buf
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EventEncoder;

impl Encoder for EventEncoder {
    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let mut event = Event::new();
        event
            .field(FIELD_KEY_LEVEL, record.level.as_str())?
            .field(FIELD_KEY_TIME, &record.time_text())?;
        for (key, value) in record.wire_fields() {
            event.field(&key, value)?;
        }
        if let Some(error) = &record.error {
            event.field(FIELD_KEY_ERROR, error)?;
        }
        event.field(FIELD_KEY_MSG, &record.message)?;
        Ok(event.finish())
    }
}

#[derive(Clone)]
pub struct EventEngine {
    shared: Arc<Shared>,
    level: i8,
    context: Fields,
    error: Option<String>,
}

impl EventEngine {
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            shared: Shared::new(options, CALLER_DEPTH, EngineKind::Event.as_str())?,
            level: native_level(options.level),
            context: Fields::new(),
            error: None,
        })
    }

    #[inline(never)]
    fn msg(&self, record: Record) -> Result<()> {
        let mut event = record.with_fields(&self.context).with_error(self.error.as_deref());
        let staged = self.shared.pipeline.run(&mut event, &EventEncoder);
        let terminal = EventEncoder
            .encode(&event)
            .and_then(|buf| self.shared.write_terminal(&buf));
        settle(&self.shared, staged, terminal)
    }
}

impl Engine for EventEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Event
    }

    fn enabled(&self, level: Level) -> bool {
        native_level(level) >= self.level
    }

    fn with_fields(&self, fields: &Fields) -> Arc<dyn Engine> {
        let mut next = self.clone();
        next.context
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
        self.msg(record)
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.shared.flush(timeout)
    }

    fn error_handler(&self) -> &ErrorHandler {
        &self.shared.on_error
    }
}
