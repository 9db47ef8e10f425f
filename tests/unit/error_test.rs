//! Tests for error types

use bounded_elastic::core::SchedulerError;

#[test]
fn test_rejected_execution_error() {
    let err = SchedulerError::RejectedExecution { cap: 4, backlog_cap: 16 };
    assert_eq!(
        format!("{err}"),
        "rejected execution: cap 4 and backlog 16 exhausted"
    );
}

#[test]
fn test_disposed_error() {
    assert_eq!(format!("{}", SchedulerError::Disposed), "scheduler disposed");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("cap must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: cap must be greater than 0"
    );
}

#[test]
fn test_thread_spawn_error() {
    let err = SchedulerError::ThreadSpawn("resource temporarily unavailable".to_string());
    assert_eq!(
        format!("{err}"),
        "thread spawn failed: resource temporarily unavailable"
    );
}

#[test]
fn test_errors_compare_by_value() {
    assert_eq!(
        SchedulerError::RejectedExecution { cap: 1, backlog_cap: 0 },
        SchedulerError::RejectedExecution { cap: 1, backlog_cap: 0 }
    );
    assert_ne!(SchedulerError::Disposed, SchedulerError::InvalidConfig(String::new()));
}
