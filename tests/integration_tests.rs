//! Integration tests for the logging pipeline
//!
//! These tests verify:
//! - Severity routing between normal and error files
//! - Record shape shared by every engine
//! - Caller resolution, including user-level skips
//! - Stage failure isolation
//! - Telemetry bridge and trace correlation
//! - Thread safety of shared sinks

mod common;

use common::{read_records, Capture};
use parking_lot::Mutex;
use rust_log_pipeline::prelude::*;
use rust_log_pipeline::telemetry::JsonLinesExporter;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

fn checkout_logger(dir: &TempDir, engine: EngineKind, out: &Capture) -> Logger {
    Logger::builder()
        .engine(engine)
        .service_name("checkout")
        .level(Level::Info)
        .output(out.clone())
        .local_fs(LocalFsConfig::new(dir.path().join("orders.log")))
        .build()
        .expect("Failed to build logger")
}

// ============================================================================
// Local split files
// ============================================================================

#[test]
fn test_checkout_order_placed() {
    for engine in EngineKind::ALL {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let out = Capture::default();
        let logger = checkout_logger(&temp_dir, engine, &out);

        logger
            .with_field("order_id", "42")
            .info(&Context::background(), "order placed");

        let records = read_records(&temp_dir.path().join("orders.log"));
        assert_eq!(records.len(), 1, "engine {}", engine);
        let record = &records[0];
        assert_eq!(record["service"], "checkout");
        assert_eq!(record["level"], "info");
        assert_eq!(record["order_id"], "42");
        assert!(record["msg"].as_str().unwrap().contains("order placed"));

        assert!(read_records(&temp_dir.path().join("orders.err.log")).is_empty());
        assert_eq!(out.lines().len(), 1, "primary output also gets the record");
    }
}

#[test]
fn test_checkout_payment_failed() {
    for engine in EngineKind::ALL {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let logger = checkout_logger(&temp_dir, engine, &Capture::default());

        logger.error(&Context::background(), "payment failed");

        let errors = read_records(&temp_dir.path().join("orders.err.log"));
        assert_eq!(errors.len(), 1, "engine {}", engine);
        assert_eq!(errors[0]["msg"], "payment failed");
        assert_eq!(errors[0]["level"], "error");
        assert!(read_records(&temp_dir.path().join("orders.log")).is_empty());
    }
}

#[test]
fn test_routing_with_warn_threshold() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::builder()
        .output(Capture::default())
        .local_fs(LocalFsConfig::new(temp_dir.path().join("app.log")).with_error_level(Level::Warn))
        .build()
        .expect("Failed to build logger");
    let ctx = Context::background();

    logger.info(&ctx, "info");
    logger.warn(&ctx, "warn");
    logger.error(&ctx, "error");

    let normal: Vec<Value> = read_records(&temp_dir.path().join("app.log"));
    let errors: Vec<Value> = read_records(&temp_dir.path().join("app.err.log"));
    let msgs = |records: &[Value]| -> Vec<String> {
        records.iter().map(|r| r["msg"].as_str().unwrap().to_string()).collect()
    };
    assert_eq!(msgs(&normal), vec!["info"]);
    assert_eq!(msgs(&errors), vec!["warn", "error"]);
}

#[test]
fn test_round_trip_keeps_call_site_fields() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::builder()
        .engine(EngineKind::Handler)
        .service_name("inventory")
        .output(Capture::default())
        .local_fs(LocalFsConfig::new(temp_dir.path().join("stock.log")))
        .build()
        .expect("Failed to build logger");

    logger
        .with_fields([
            ("sku", json!("A-100")),
            ("quantity", json!(3)),
            ("backorder", json!(false)),
            ("tags", json!(["fragile", "heavy"])),
        ])
        .warn(&Context::background(), "low stock");

    let records = read_records(&temp_dir.path().join("stock.log"));
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["service"], "inventory");
    assert_eq!(record["level"], "warn");
    assert_eq!(record["msg"], "low stock");
    assert_eq!(record["sku"], "A-100");
    assert_eq!(record["quantity"], 3);
    assert_eq!(record["backorder"], false);
    assert_eq!(record["tags"], json!(["fragile", "heavy"]));
}

#[test]
fn test_custom_error_suffix() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Logger::builder()
        .output(Capture::default())
        .local_fs(LocalFsConfig::new(temp_dir.path().join("jobs.log")).with_error_suffix(".failed"))
        .build()
        .expect("Failed to build logger");

    logger.error(&Context::background(), "job crashed");
    assert_eq!(read_records(&temp_dir.path().join("jobs.failed.log")).len(), 1);
}

#[test]
fn test_build_fails_on_unopenable_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let blocker = temp_dir.path().join("not_a_dir");
    std::fs::write(&blocker, "x").expect("Failed to write blocker");

    let result = Logger::builder()
        .local_fs(LocalFsConfig::new(blocker.join("app.log")))
        .build();
    assert!(result.is_err());
}

// ============================================================================
// Record shape
// ============================================================================

#[test]
fn test_all_engines_share_field_names() {
    let mut shapes = Vec::new();
    for engine in EngineKind::ALL {
        let out = Capture::default();
        let logger = Logger::builder()
            .engine(engine)
            .service_name("shape")
            .output(out.clone())
            .build()
            .expect("Failed to build logger");
        let ctx = Context::from_traceparent(TRACEPARENT).unwrap();

        logger
            .with_field("order_id", "7")
            .with_error(&std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .error(&ctx, "shape check");

        let line = &out.lines()[0];
        let keys: BTreeSet<String> = line.as_object().unwrap().keys().cloned().collect();
        shapes.push((engine, keys));
    }

    let expected: BTreeSet<String> = [
        "caller", "error", "level", "msg", "order_id", "service", "time", "timestamp", "trace_id",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for (engine, keys) in shapes {
        assert_eq!(keys, expected, "engine {}", engine);
    }
}

#[test]
fn test_reserved_field_names_are_prefixed() {
    for engine in EngineKind::ALL {
        let out = Capture::default();
        let logger = Logger::builder()
            .engine(engine)
            .output(out.clone())
            .build()
            .expect("Failed to build logger");

        logger
            .with_field("msg", "shadow")
            .with_field("level", "shadow")
            .info(&Context::background(), "real");

        let line = &out.lines()[0];
        assert_eq!(line["msg"], "real", "engine {}", engine);
        assert_eq!(line["level"], "info");
        assert_eq!(line["fields.msg"], "shadow");
        assert_eq!(line["fields.level"], "shadow");
    }
}

#[test]
fn test_timestamp_and_time_fields() {
    let out = Capture::default();
    let logger = Logger::builder()
        .output(out.clone())
        .build()
        .expect("Failed to build logger");

    let before = chrono::Local::now().timestamp();
    logger.info(&Context::background(), "tick");
    let after = chrono::Local::now().timestamp();

    let line = &out.lines()[0];
    let ts = line["timestamp"].as_i64().unwrap();
    assert!(before <= ts && ts <= after);
    let time = line["time"].as_str().unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M:%S").is_ok());
}

#[test]
fn test_enrichment_can_be_disabled() {
    let out = Capture::default();
    let logger = Logger::builder()
        .caller(false)
        .timestamp(false)
        .output(out.clone())
        .build()
        .expect("Failed to build logger");

    logger.info(&Context::from_traceparent(TRACEPARENT).unwrap(), "bare");
    let line = &out.lines()[0];
    assert!(line.get("caller").is_none());
    assert!(line.get("timestamp").is_none());
    assert!(line.get("service").is_none());
    assert_eq!(line["trace_id"], "4bf92f3577b34da6a3ce929d0e0e4736");
}

// ============================================================================
// Derivations
// ============================================================================

#[test]
fn test_with_fields_union_and_base_untouched() {
    let out = Capture::default();
    let base = Logger::builder()
        .engine(EngineKind::Event)
        .output(out.clone())
        .build()
        .expect("Failed to build logger");
    let ctx = Context::background();

    let derived = base
        .with_fields([("a", json!(1)), ("b", json!(1))])
        .with_fields([("b", json!(2)), ("c", json!(2))]);
    derived.info(&ctx, "derived");
    base.info(&ctx, "base");

    let lines = out.lines();
    assert_eq!(lines[0]["a"], 1);
    assert_eq!(lines[0]["b"], 2);
    assert_eq!(lines[0]["c"], 2);
    for key in ["a", "b", "c"] {
        assert!(lines[1].get(key).is_none(), "base saw {}", key);
    }
}

// ============================================================================
// Caller resolution
// ============================================================================

#[test]
fn test_caller_points_at_call_site() {
    for engine in EngineKind::ALL {
        let out = Capture::default();
        let logger = Logger::builder()
            .engine(engine)
            .output(out.clone())
            .build()
            .expect("Failed to build logger");

        let line = line!() + 1;
        logger.info(&Context::background(), "where am I");

        assert_eq!(
            out.lines()[0]["caller"],
            format!("tests/integration_tests.rs:{}", line),
            "engine {}",
            engine
        );
    }
}

#[inline(never)]
fn audit(logger: &Logger, msg: &str) {
    logger.info(&Context::background(), msg);
}

#[test]
fn test_caller_skip_steps_over_helper() {
    for engine in EngineKind::ALL {
        let out = Capture::default();
        let logger = Logger::builder()
            .engine(engine)
            .caller_skip(1)
            .output(out.clone())
            .build()
            .expect("Failed to build logger");

        let line = line!() + 1;
        audit(&logger, "via helper");

        assert_eq!(
            out.lines()[0]["caller"],
            format!("tests/integration_tests.rs:{}", line),
            "engine {}",
            engine
        );
    }
}

// ============================================================================
// Failure isolation
// ============================================================================

#[test]
fn test_failing_sink_does_not_silence_primary_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let out = Capture::default();
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);

    let logger = Logger::builder()
        .output(out.clone())
        .rotate(RotateConfig::new(temp_dir.path().join("tiny.log")).with_max_size_kb(1))
        .error_handler(move |e| sink.lock().push(e.to_string()))
        .build()
        .expect("Failed to build logger");

    // Larger than the whole rotated file may ever be.
    let payload = "x".repeat(2048);
    logger.error(&Context::background(), &payload);

    assert_eq!(out.lines().len(), 1);
    assert_eq!(out.lines()[0]["msg"], payload.as_str());
    let reported = reported.lock();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].starts_with("Stage 'rotate' failed on error record"), "{}", reported[0]);
}

// ============================================================================
// Telemetry and trace correlation
// ============================================================================

#[test]
fn test_telemetry_bridge_exports_records() {
    let exported = Capture::default();
    let logger = Logger::builder()
        .engine(EngineKind::Hook)
        .service_name("checkout")
        .output(Capture::default())
        .telemetry(true)
        .exporter(Arc::new(JsonLinesExporter::new(exported.clone())))
        .build()
        .expect("Failed to build logger");
    let ctx = Context::from_traceparent(TRACEPARENT).unwrap();

    logger.with_field("order_id", 42).warn(&ctx, "slow payment");
    logger.error(&ctx, "declined");
    logger.debug(&ctx, "gated");

    let exported = exported.lines();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0]["severity_number"], 13);
    assert_eq!(exported[0]["severity_text"], "warn");
    assert_eq!(exported[0]["body"], "slow payment");
    assert_eq!(exported[0]["scope"], "hook");
    assert_eq!(exported[0]["trace_id"], "4bf92f3577b34da6a3ce929d0e0e4736");
    assert_eq!(exported[0]["span_id"], "00f067aa0ba902b7");
    let attributes = exported[0]["attributes"].as_array().unwrap();
    assert!(attributes.contains(&json!(["order_id", "42"])));
    assert!(attributes.contains(&json!(["service", "checkout"])));
    assert_eq!(exported[1]["severity_number"], 17);
}

#[test]
fn test_failing_exporter_is_reported_not_raised() {
    struct Down;
    impl LogExporter for Down {
        fn export(&self, _ctx: &Context, _record: TelemetryRecord) -> rust_log_pipeline::Result<()> {
            Err(LoggerError::export("collector unreachable"))
        }
    }

    let out = Capture::default();
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let logger = Logger::builder()
        .output(out.clone())
        .telemetry(true)
        .exporter(Arc::new(Down))
        .error_handler(move |e| sink.lock().push(e.to_string()))
        .build()
        .expect("Failed to build logger");

    logger.info(&Context::background(), "still written");

    assert_eq!(out.lines().len(), 1);
    assert_eq!(reported.lock().len(), 1);
    assert!(reported.lock()[0].contains("collector unreachable"));
}

#[test]
fn test_custom_trace_id_fn() {
    let out = Capture::default();
    let logger = Logger::builder()
        .output(out.clone())
        .trace_id_fn(|ctx| {
            ctx.span_context()
                .map(|s| format!("span-{}", s.span_id))
                .unwrap_or_default()
        })
        .build()
        .expect("Failed to build logger");

    logger.info(&Context::background(), "no span");
    logger.info(&Context::from_traceparent(TRACEPARENT).unwrap(), "with span");

    let lines = out.lines();
    assert!(lines[0].get("trace_id").is_none());
    assert_eq!(lines[1]["trace_id"], "span-00f067aa0ba902b7");
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_logger_from_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("svc.log");
    let config: LoggerConfig = serde_json::from_value(json!({
        "engine": "event",
        "level": "warn",
        "service_name": "svc",
        "local_fs": { "path": path },
    }))
    .expect("Failed to parse config");

    let logger = Logger::from_config(config).expect("Failed to build logger");
    assert_eq!(logger.engine_kind(), EngineKind::Event);
    assert!(!logger.enabled(Level::Info));

    logger.warn(&Context::background(), "configured");
    let records = read_records(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["service"], "svc");
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_writers_share_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let base = Logger::builder()
        .engine(EngineKind::Core)
        .output(Capture::default())
        .local_fs(LocalFsConfig::new(temp_dir.path().join("shared.log")))
        .build()
        .expect("Failed to build logger");

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let logger = base.with_field("worker", worker);
            thread::spawn(move || {
                let ctx = Context::background();
                for seq in 0..100 {
                    logger.with_field("seq", seq).info(&ctx, "tick");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let records = read_records(&temp_dir.path().join("shared.log"));
    assert_eq!(records.len(), 800);
    for worker in 0..8 {
        let seqs: Vec<i64> = records
            .iter()
            .filter(|r| r["worker"] == worker)
            .map(|r| r["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, (0..100).collect::<Vec<i64>>(), "worker {} out of order", worker);
    }
}

// ============================================================================
// Process termination
// ============================================================================

#[test]
fn test_fatal_writes_then_exits_with_one() {
    if let Ok(path) = std::env::var("LOG_PIPELINE_FATAL_PATH") {
        let logger = Logger::builder()
            .output(std::io::sink())
            .local_fs(LocalFsConfig::new(path))
            .build()
            .expect("Failed to build logger");
        logger.fatal(&Context::background(), "unrecoverable");
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("fatal.log");
    let status = Command::new(std::env::current_exe().expect("no test binary"))
        .args(["--exact", "test_fatal_writes_then_exits_with_one", "--nocapture"])
        .env("LOG_PIPELINE_FATAL_PATH", &path)
        .status()
        .expect("Failed to run child");

    assert_eq!(status.code(), Some(1));
    let records = read_records(&temp_dir.path().join("fatal.err.log"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "fatal");
    assert_eq!(records[0]["msg"], "unrecoverable");
}
