//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry formatting, DefaultLogger and FileLogger.

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, FileLogger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, message: &str) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "ember::Test".to_string(),
        message: message.to_string(),
        file: None,
        line: None,
    }
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("ember_log_{}_{}", name, std::process::id()))
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = entry(LogSeverity::Info, "swapchain ready").format_plain();
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[ember::Test]"));
    assert!(line.ends_with("swapchain ready"));
}

#[test]
fn test_format_plain_with_location() {
    let mut e = entry(LogSeverity::Error, "submit failed");
    e.file = Some("frame_core.rs");
    e.line = Some(42);
    let line = e.format_plain();
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("submit failed (frame_core.rs:42)"));
}

#[test]
fn test_default_logger_accepts_all_severities() {
    let logger = DefaultLogger;
    logger.log(&entry(LogSeverity::Trace, "trace"));
    logger.log(&entry(LogSeverity::Error, "error"));
}

// ============================================================================
// FILE LOGGER TESTS
// ============================================================================

#[test]
fn test_file_logger_creates_directory_and_file() {
    let dir = scratch_dir("create");
    let _ = std::fs::remove_dir_all(&dir);

    let logger = FileLogger::new(&dir, LogSeverity::Trace).unwrap();
    assert!(dir.is_dir());
    assert!(logger.path().starts_with(&dir));
    assert_eq!(logger.path().extension().unwrap(), "log");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_file_logger_filters_by_severity() {
    let dir = scratch_dir("filter");
    let _ = std::fs::remove_dir_all(&dir);

    let logger = FileLogger::new(&dir, LogSeverity::Warn).unwrap();
    logger.log(&entry(LogSeverity::Info, "dropped line"));
    logger.log(&entry(LogSeverity::Warn, "kept line"));

    let contents = std::fs::read_to_string(logger.path()).unwrap();
    assert!(!contents.contains("dropped line"));
    assert!(contents.contains("kept line"));
    assert_eq!(contents.lines().count(), 1);

    std::fs::remove_dir_all(&dir).ok();
}
