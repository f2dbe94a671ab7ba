use std::io::Write;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use upload_tracker::{ConfigError, LogTarget, TrackerConfig, UploadTracker};

#[test]
fn empty_document_uses_defaults() {
    let config = TrackerConfig::from_ron_str("()").expect("config");
    assert_eq!(config, TrackerConfig::default());

    let settings = config.tracker_settings();
    assert_eq!(settings.poll_interval, Duration::from_secs(2));
    assert_eq!(settings.retention_grace, Duration::from_secs(10));
    assert_eq!(config.client_settings().job_status_path, "api/jobs/{job_id}");
}

#[test]
fn loads_partial_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"(
            server: (base_url: "http://ingest.local:9000/", status_timeout_secs: 3),
            polling: (interval_ms: 500),
            logging: (destination: Both, level: "debug"),
        )"#
    )
    .expect("write config");

    let config = TrackerConfig::load(file.path()).expect("config");
    assert_eq!(config.server.base_url, "http://ingest.local:9000/");
    assert_eq!(config.server.submit_path, "api/upload");
    assert_eq!(config.polling.interval_ms, 500);
    assert_eq!(config.polling.retention_grace_secs, 10);
    assert_eq!(config.logging.destination, LogTarget::Both);

    let client = config.client_settings();
    assert_eq!(client.status_timeout, Duration::from_secs(3));
    assert_eq!(
        config.tracker_settings().poll_interval,
        Duration::from_millis(500)
    );
    assert_eq!(
        config.log_settings().expect("log settings").level,
        log::LevelFilter::Debug
    );
}

#[test]
fn missing_file_reports_path() {
    let err = TrackerConfig::load(Path::new("/definitely/not/here.ron")).unwrap_err();
    match err {
        ConfigError::Read { path, .. } => assert_eq!(path, Path::new("/definitely/not/here.ron")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn malformed_document_is_a_parse_error() {
    let err = TrackerConfig::from_ron_str("(server: (base_url: 42))").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
}

#[test]
fn rejects_zero_interval() {
    let err = TrackerConfig::from_ron_str("(polling: (interval_ms: 0))").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");
}

#[test]
fn rejects_status_path_without_placeholder() {
    let err =
        TrackerConfig::from_ron_str(r#"(server: (job_status_path: "api/jobs/latest"))"#).unwrap_err();
    assert!(err.to_string().contains("{job_id}"), "{err}");
}

#[test]
fn rejects_unknown_log_level() {
    let err = TrackerConfig::from_ron_str(r#"(logging: (level: "loud"))"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");
}

#[test]
fn written_config_reads_back() {
    let mut config = TrackerConfig::default();
    config.server.submit_timeout_secs = Some(120);
    config.polling.retention_grace_secs = 30;

    let text = config.to_ron_string().expect("serialize");
    assert_eq!(TrackerConfig::from_ron_str(&text).expect("parse"), config);
}

#[tokio::test]
async fn tracker_builds_from_config() {
    let config = TrackerConfig::default();
    let tracker = UploadTracker::from_config(&config).expect("tracker");
    assert!(tracker.snapshot().uploads.is_empty());
    assert!(!tracker.has_active());
}
