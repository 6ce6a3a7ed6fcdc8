//! Log record structure and the field names every engine writes

use super::context::Context;
use super::level::Level;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::panic::Location;

pub const FIELD_KEY_MSG: &str = "msg";
pub const FIELD_KEY_LEVEL: &str = "level";
pub const FIELD_KEY_TIME: &str = "time";
pub const FIELD_KEY_TIMESTAMP: &str = "timestamp";
pub const FIELD_KEY_CALLER: &str = "caller";
pub const FIELD_KEY_SERVICE: &str = "service";
pub const FIELD_KEY_TRACE_ID: &str = "trace_id";
pub const FIELD_KEY_ERROR: &str = "error";

/// Layout of the `time` field
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Structured fields attached to a record
pub type Fields = BTreeMap<String, Value>;

/// One logging event. Built per write call, enriched by the pipeline and
/// dropped after the terminal write.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Local>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    pub error: Option<String>,
    pub context: Context,
    pub call_site: &'static Location<'static>,
}

impl Record {
    pub fn new(
        level: Level,
        message: String,
        context: &Context,
        call_site: &'static Location<'static>,
    ) -> Self {
        Self {
            time: Local::now(),
            level,
            message,
            fields: Fields::new(),
            error: None,
            context: context.clone(),
            call_site,
        }
    }

    pub fn with_fields(mut self, fields: &Fields) -> Self {
        self.fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_owned);
        self
    }

    /// Unix-epoch seconds of the record time
    pub fn unix_timestamp(&self) -> i64 {
        self.time.timestamp()
    }

    /// Record time rendered with [`TIME_FORMAT`]
    pub fn time_text(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// Fields as they appear on the wire: keys that collide with `msg`,
    /// `level` or `time` are prefixed with `fields.`, and a carried error
    /// shadows a user field named `error`.
    pub fn wire_fields(&self) -> impl Iterator<Item = (Cow<'_, str>, &Value)> {
        let has_error = self.error.is_some();
        self.fields
            .iter()
            .filter(move |(k, _)| !(has_error && k.as_str() == FIELD_KEY_ERROR))
            .map(|(k, v)| (wire_key(k), v))
    }
}

/// Rename keys that would overwrite the fixed record keys
pub fn wire_key(key: &str) -> Cow<'_, str> {
    match key {
        FIELD_KEY_MSG | FIELD_KEY_LEVEL | FIELD_KEY_TIME => Cow::Owned(format!("fields.{}", key)),
        _ => Cow::Borrowed(key),
    }
}

/// Render an error with its source chain: `outer: inner: root`
pub fn render_error(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
