//! Fan-out of encoded records to a split file pair

use super::{Encoder, Stage};
use crate::core::error::Result;
use crate::core::record::Record;
use crate::sinks::{LogWriter, SplitSink};
use std::time::Duration;

pub struct SplitSinkStage<W> {
    name: &'static str,
    sink: SplitSink<W>,
}

impl<W: LogWriter> SplitSinkStage<W> {
    pub fn new(name: &'static str, sink: SplitSink<W>) -> Self {
        Self { name, sink }
    }

    pub fn sink(&self) -> &SplitSink<W> {
        &self.sink
    }
}

impl<W: LogWriter> Stage for SplitSinkStage<W> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, record: &mut Record, encoder: &dyn Encoder) -> Result<()> {
        let buf = encoder.encode(record)?;
        self.sink.write(record.level, &buf)
    }

    fn flush(&self) -> Result<()> {
        self.sink.flush()
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        self.sink.wait_idle(timeout)
    }
}
