//! Helpers shared by the integration test binaries

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// In-memory primary output that can be inspected after logging
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<Value> {
        parse_lines(&self.text())
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn parse_lines(text: &str) -> Vec<Value> {
    text.lines()
        .map(|line| serde_json::from_str(line).expect("log line is not JSON"))
        .collect()
}

/// JSON records of a log file; a missing file has none
pub fn read_records(path: &Path) -> Vec<Value> {
    match fs::read_to_string(path) {
        Ok(text) => parse_lines(&text),
        Err(_) => Vec::new(),
    }
}
