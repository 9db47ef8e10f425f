//! Tests for configuration validation

use bounded_elastic::config::{
    default_cap, SchedulerConfig, DEFAULT_BACKLOG_CAP, DEFAULT_THREAD_PREFIX,
};
use bounded_elastic::core::SchedulerError;

#[test]
fn test_default_config() {
    let config = SchedulerConfig::default();
    assert_eq!(config.cap, default_cap());
    assert_eq!(config.cap % 10, 0);
    assert_eq!(config.backlog_cap, DEFAULT_BACKLOG_CAP);
    assert_eq!(config.thread_name_prefix, DEFAULT_THREAD_PREFIX);
    assert_eq!(config.stack_size, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_zero_cap_invalid() {
    let invalid = SchedulerConfig::new().with_cap(0);
    assert!(matches!(invalid.validate(), Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_config_zero_backlog_valid() {
    let config = SchedulerConfig::new().with_cap(1).with_backlog_cap(0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_blank_prefix_invalid() {
    let invalid = SchedulerConfig::new().with_thread_name_prefix("  ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_zero_stack_size_invalid() {
    let invalid = SchedulerConfig::new().with_stack_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json_partial() {
    let config = SchedulerConfig::from_json_str(r#"{"cap": 3, "thread_name_prefix": "ingest"}"#)
        .unwrap();
    assert_eq!(config.cap, 3);
    assert_eq!(config.backlog_cap, DEFAULT_BACKLOG_CAP);
    assert_eq!(config.thread_name_prefix, "ingest");
}

#[test]
fn test_config_from_json_rejects_invalid() {
    let parse = SchedulerConfig::from_json_str("{not json");
    assert!(matches!(parse, Err(SchedulerError::InvalidConfig(msg)) if msg.starts_with("parse error")));

    let invalid = SchedulerConfig::from_json_str(r#"{"cap": 0}"#);
    assert!(invalid.is_err());
}

#[test]
fn test_config_json_serialization() {
    let config = SchedulerConfig::new()
        .with_cap(8)
        .with_backlog_cap(64)
        .with_stack_size(512 * 1024);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"cap\":8"));
    assert!(json.contains("\"backlog_cap\":64"));
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), config);
}
