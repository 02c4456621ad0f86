use super::*;
use crate::engine::Engine;
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helpers
// ============================================================================

/// Logger that captures entries for inspection
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capture_logger() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger {
        entries: entries.clone(),
    });
    entries
}

/// Entries from this test module only. Other tests log through the global
/// logger concurrently, so assertions filter by source.
fn from_source(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.source == source)
        .cloned()
        .collect()
}

// ============================================================================
// Severity ordering
// ============================================================================

#[test]
fn test_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

// ============================================================================
// Macro dispatch through the engine logger
// ============================================================================

#[test]
#[serial]
fn test_info_macro_reaches_custom_logger() {
    let entries = install_capture_logger();

    crate::engine_info!("nova::log_tests::info", "hello {}", 42);

    let captured = from_source(&entries, "nova::log_tests::info");
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "hello 42");
    assert!(captured[0].file.is_none());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_error_macro_carries_file_and_line() {
    let entries = install_capture_logger();

    crate::engine_error!("nova::log_tests::error", "boom");

    let captured = from_source(&entries, "nova::log_tests::error");
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_each_macro_maps_to_its_severity() {
    let entries = install_capture_logger();

    crate::engine_trace!("nova::log_tests::all", "t");
    crate::engine_debug!("nova::log_tests::all", "d");
    crate::engine_info!("nova::log_tests::all", "i");
    crate::engine_warn!("nova::log_tests::all", "w");
    crate::engine_error!("nova::log_tests::all", "e");

    let captured = from_source(&entries, "nova::log_tests::all");
    let severities: Vec<LogSeverity> = captured.iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![
            LogSeverity::Trace,
            LogSeverity::Debug,
            LogSeverity::Info,
            LogSeverity::Warn,
            LogSeverity::Error,
        ]
    );

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_restores_default() {
    let entries = install_capture_logger();
    Engine::reset_logger();

    // goes to DefaultLogger (stdout), not the capture
    crate::engine_info!("nova::log_tests::reset", "after reset");

    assert!(from_source(&entries, "nova::log_tests::reset").is_empty());
}

// ============================================================================
// DefaultLogger smoke test
// ============================================================================

#[test]
fn test_default_logger_does_not_panic() {
    let logger = DefaultLogger;
    logger.log(&LogEntry {
        severity: LogSeverity::Error,
        timestamp: std::time::SystemTime::now(),
        source: "nova::log_tests".to_string(),
        message: "with location".to_string(),
        file: Some("log_tests.rs"),
        line: Some(1),
    });
    logger.log(&LogEntry {
        severity: LogSeverity::Info,
        timestamp: std::time::SystemTime::now(),
        source: "nova::log_tests".to_string(),
        message: "no location".to_string(),
        file: None,
        line: None,
    });
}
