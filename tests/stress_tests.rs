//! Stress tests for shared sinks under concurrent load
//!
//! These tests verify:
//! - No record is lost or torn while many threads rotate the same file
//! - Error records are never routed to the normal file under load
//! - Swapping the default logger while threads log is safe

mod common;

use common::{parse_lines, Capture};
use rust_log_pipeline::prelude::*;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const THREADS: usize = 8;
const PER_THREAD: usize = 200;

/// Every line in every file of `dir` whose name starts with `prefix`,
/// including gzip archives
fn collect_records(dir: &std::path::Path, prefix: &str) -> Vec<serde_json::Value> {
    let mut records = Vec::new();
    for entry in fs::read_dir(dir).expect("Failed to read dir") {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if !name.starts_with(prefix) || name.ends_with(".tmp") {
            continue;
        }
        let text = if name.ends_with(".gz") {
            let mut text = String::new();
            std::io::Read::read_to_string(
                &mut flate2::read::GzDecoder::new(fs::File::open(&path).unwrap()),
                &mut text,
            )
            .expect("Archive is not valid gzip");
            text
        } else {
            fs::read_to_string(&path).unwrap()
        };
        records.extend(parse_lines(&text));
    }
    records
}

/// Rotation under contention keeps every record whole and exactly once
#[test]
fn test_concurrent_rotation_loses_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::builder()
        .engine(EngineKind::Handler)
        .output(std::io::sink())
        .rotate(RotateConfig::new(temp_dir.path().join("load.log")).with_max_size_kb(4))
        .build()
        .expect("Failed to build logger");

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let logger = logger.with_field("worker", worker);
            thread::spawn(move || {
                let ctx = Context::background();
                for seq in 0..PER_THREAD {
                    logger.with_field("seq", seq).info(&ctx, "under load");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }
    logger.flush().unwrap();

    let records = collect_records(temp_dir.path(), "load.");
    assert_eq!(records.len(), THREADS * PER_THREAD);

    let mut seen = vec![vec![false; PER_THREAD]; THREADS];
    for record in &records {
        let worker = record["worker"].as_u64().unwrap() as usize;
        let seq = record["seq"].as_u64().unwrap() as usize;
        assert!(!seen[worker][seq], "duplicate record {}/{}", worker, seq);
        seen[worker][seq] = true;
    }
}

/// Mixed severities under load with compression on
#[test]
fn test_concurrent_split_with_compression() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::builder()
        .output(std::io::sink())
        .rotate(
            RotateConfig::new(temp_dir.path().join("mixed.log"))
                .with_max_size_kb(2)
                .with_compression(true),
        )
        .build()
        .expect("Failed to build logger");

    let errors_sent = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let logger = logger.clone();
            let errors_sent = Arc::clone(&errors_sent);
            thread::spawn(move || {
                let ctx = Context::background();
                for seq in 0..PER_THREAD {
                    if (worker + seq) % 5 == 0 {
                        logger.error(&ctx, "failed");
                        errors_sent.fetch_add(1, Ordering::Relaxed);
                    } else {
                        logger.info(&ctx, "ok");
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }
    logger.flush().unwrap();

    let errors = collect_records(temp_dir.path(), "mixed.err.");
    assert_eq!(errors.len(), errors_sent.load(Ordering::Relaxed));
    assert!(errors.iter().all(|r| r["level"] == "error"));

    let normal: Vec<_> = collect_records(temp_dir.path(), "mixed.")
        .into_iter()
        .filter(|r| r["level"] != "error")
        .collect();
    assert_eq!(normal.len(), THREADS * PER_THREAD - errors.len());
    assert!(normal.iter().all(|r| r["level"] == "info"));
}

/// Readers of the default logger always get a usable handle while it is
/// replaced concurrently
#[test]
fn test_default_logger_swap_under_load() {
    let outputs: Vec<Capture> = (0..4).map(|_| Capture::default()).collect();
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writers: Vec<_> = (0..THREADS)
        .map(|_| {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let ctx = Context::background();
                let mut sent = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    global::info(&ctx, "tick");
                    sent += 1;
                }
                sent
            })
        })
        .collect();

    for round in 0..50 {
        let out = outputs[round % outputs.len()].clone();
        rust_log_pipeline::reset_logger(
            Logger::builder()
                .engine(EngineKind::ALL[round % EngineKind::ALL.len()])
                .output(out)
                .build()
                .expect("Failed to build logger"),
        );
        thread::yield_now();
    }
    stop.store(true, Ordering::Relaxed);
    let sent: usize = writers
        .into_iter()
        .map(|w| w.join().expect("writer panicked"))
        .sum();

    let written: usize = outputs.iter().map(|o| o.lines().len()).sum();
    assert!(written <= sent);
    for out in &outputs {
        assert!(out.lines().iter().all(|r| r["msg"] == "tick"));
    }
    rust_log_pipeline::reset_logger(Logger::default());
}
