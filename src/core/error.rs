//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
///
/// Only genuine capacity exhaustion is surfaced by the scheduling calls
/// themselves. Scheduling against a disposed scheduler or worker yields a
/// pre-cancelled [`TaskHandle`](crate::core::TaskHandle) instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Both the context cap and the pending-request backlog are exhausted.
    #[error("rejected execution: cap {cap} and backlog {backlog_cap} exhausted")]
    RejectedExecution {
        /// Configured maximum of live contexts.
        cap: usize,
        /// Configured maximum of queued worker requests.
        backlog_cap: usize,
    },
    /// The scheduler has been disposed.
    #[error("scheduler disposed")]
    Disposed,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A backing thread could not be started.
    #[error("thread spawn failed: {0}")]
    ThreadSpawn(String),
}
