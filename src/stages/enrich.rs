//! Stages that attach derived fields

use super::{Encoder, Stage};
use crate::core::context::Context;
use crate::core::error::Result;
use crate::core::frame::FrameResolver;
use crate::core::options::TraceIdFn;
use crate::core::record::{
    Record, FIELD_KEY_CALLER, FIELD_KEY_SERVICE, FIELD_KEY_TIMESTAMP, FIELD_KEY_TRACE_ID,
};
use serde_json::Value;
use std::sync::Arc;

pub struct CallerStage {
    resolver: FrameResolver,
}

impl CallerStage {
    pub fn new(resolver: FrameResolver) -> Self {
        Self { resolver }
    }
}

impl Stage for CallerStage {
    fn name(&self) -> &'static str {
        "caller"
    }

    fn apply(&self, record: &mut Record, _encoder: &dyn Encoder) -> Result<()> {
        let caller = self.resolver.resolve(record.call_site);
        record
            .fields
            .insert(FIELD_KEY_CALLER.to_string(), Value::String(caller));
        Ok(())
    }
}

/// Unix-epoch seconds of the record, independent of the `time` text
pub struct TimestampStage;

impl Stage for TimestampStage {
    fn name(&self) -> &'static str {
        "timestamp"
    }

    fn apply(&self, record: &mut Record, _encoder: &dyn Encoder) -> Result<()> {
        let ts = record.unix_timestamp();
        record
            .fields
            .insert(FIELD_KEY_TIMESTAMP.to_string(), Value::from(ts));
        Ok(())
    }
}

pub struct ServiceStage {
    service: Value,
}

impl ServiceStage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: Value::String(service.into()),
        }
    }
}

impl Stage for ServiceStage {
    fn name(&self) -> &'static str {
        "service"
    }

    fn apply(&self, record: &mut Record, _encoder: &dyn Encoder) -> Result<()> {
        record
            .fields
            .insert(FIELD_KEY_SERVICE.to_string(), self.service.clone());
        Ok(())
    }
}

pub struct TraceIdStage {
    extract: TraceIdFn,
}

impl TraceIdStage {
    pub fn new(extract: TraceIdFn) -> Self {
        Self { extract }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }
}

impl Stage for TraceIdStage {
    fn name(&self) -> &'static str {
        "trace_id"
    }

    fn apply(&self, record: &mut Record, _encoder: &dyn Encoder) -> Result<()> {
        let trace_id = (self.extract)(&record.context);
        if !trace_id.is_empty() {
            record
                .fields
                .insert(FIELD_KEY_TRACE_ID.to_string(), Value::String(trace_id));
        }
        Ok(())
    }
}
