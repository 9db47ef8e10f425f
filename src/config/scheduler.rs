//! Scheduler configuration structures.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Environment variable overriding [`SchedulerConfig::cap`].
pub const ENV_CAP: &str = "BOUNDED_ELASTIC_CAP";
/// Environment variable overriding [`SchedulerConfig::backlog_cap`].
pub const ENV_BACKLOG: &str = "BOUNDED_ELASTIC_BACKLOG";
/// Environment variable overriding [`SchedulerConfig::thread_name_prefix`].
pub const ENV_THREAD_PREFIX: &str = "BOUNDED_ELASTIC_THREAD_PREFIX";

/// Default number of queued worker requests once the cap is reached.
pub const DEFAULT_BACKLOG_CAP: usize = 100_000;
/// Default backing-thread name prefix.
pub const DEFAULT_THREAD_PREFIX: &str = "boundedElastic";

/// Default context cap: ten per available CPU.
#[must_use]
pub fn default_cap() -> usize {
    10 * num_cpus::get()
}

fn default_backlog_cap() -> usize {
    DEFAULT_BACKLOG_CAP
}

fn default_thread_prefix() -> String {
    DEFAULT_THREAD_PREFIX.to_string()
}

/// Construction-time scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently live contexts.
    #[serde(default = "default_cap")]
    pub cap: usize,
    /// Maximum number of worker requests queued once `cap` is reached.
    #[serde(default = "default_backlog_cap")]
    pub backlog_cap: usize,
    /// Prefix for backing-thread names.
    #[serde(default = "default_thread_prefix")]
    pub thread_name_prefix: String,
    /// Optional stack size for backing threads.
    #[serde(default)]
    pub stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cap: default_cap(),
            backlog_cap: DEFAULT_BACKLOG_CAP,
            thread_name_prefix: default_thread_prefix(),
            stack_size: None,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context cap.
    #[must_use]
    pub const fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    /// Set the backlog cap.
    #[must_use]
    pub const fn with_backlog_cap(mut self, backlog_cap: usize) -> Self {
        self.backlog_cap = backlog_cap;
        self
    }

    /// Set the thread-name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the backing-thread stack size.
    #[must_use]
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.cap == 0 {
            return Err(SchedulerError::InvalidConfig("cap must be greater than 0".into()));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "thread_name_prefix must not be empty".into(),
            ));
        }
        if self.stack_size == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "stack_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the environment, loading `.env` first if present.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if a variable cannot be parsed
    /// or the result fails validation.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SchedulerError> {
        let mut cfg = Self::default();
        if let Some(cap) = parse_var(&lookup, ENV_CAP)? {
            cfg.cap = cap;
        }
        if let Some(backlog_cap) = parse_var(&lookup, ENV_BACKLOG)? {
            cfg.backlog_cap = backlog_cap;
        }
        if let Some(prefix) = lookup(ENV_THREAD_PREFIX) {
            cfg.thread_name_prefix = prefix;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, SchedulerError>
where
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| SchedulerError::InvalidConfig(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
