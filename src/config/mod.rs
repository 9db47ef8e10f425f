//! Configuration models for the scheduler.

pub mod scheduler;

pub use scheduler::{
    default_cap, SchedulerConfig, DEFAULT_BACKLOG_CAP, DEFAULT_THREAD_PREFIX, ENV_BACKLOG,
    ENV_CAP, ENV_THREAD_PREFIX,
};
