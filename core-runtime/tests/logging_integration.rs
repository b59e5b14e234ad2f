//! Integration tests for logging helpers

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    bytes_to_mb, format_elapsed, init_logging, redact_if_sensitive, LogFormat, LoggingConfig,
    PhaseTimer,
};
use std::time::Duration;

#[test]
fn test_logging_initialization_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    // A global subscriber is already installed now.
    assert!(init_logging(config).is_err());

    let timer = PhaseTimer::start("integration", "Running phase");
    timer.finish();
}

#[test]
fn test_invalid_filter_is_config_error() {
    let config = LoggingConfig::default().with_filter("core_sync=notalevel");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_credential_redaction() {
    assert_eq!(redact_if_sensitive("client_secret", "s3cr3t"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("STORAGE_SECRET_ACCESS_KEY", "k"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("bucket", "spotify-data"), "spotify-data");
}

#[test]
fn test_progress_formatting() {
    assert_eq!(bytes_to_mb(100 * 1024 * 1024), "100.00 MB");
    assert_eq!(format_elapsed(Duration::from_secs(59)), "00:00:59");
}
