//! Fluent builder for [`BoundedElasticScheduler`].

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{BoundedElasticScheduler, FaultSink, SchedulerError, TracingFaultSink};
use crate::runtime::{NamedThreadFactory, ThreadFactory};

/// Builder assembling a scheduler from configuration and collaborators.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    thread_factory: Option<Arc<dyn ThreadFactory>>,
    fault_sink: Option<Arc<dyn FaultSink>>,
}

impl SchedulerBuilder {
    /// Start from the given configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            thread_factory: None,
            fault_sink: None,
        }
    }

    /// Configuration as currently assembled.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Set the context cap.
    #[must_use]
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.config.cap = cap;
        self
    }

    /// Set the backlog cap.
    #[must_use]
    pub fn with_backlog_cap(mut self, backlog_cap: usize) -> Self {
        self.config.backlog_cap = backlog_cap;
        self
    }

    /// Supply backing threads from `factory` instead of a named-thread factory.
    #[must_use]
    pub fn with_thread_factory(mut self, factory: Arc<dyn ThreadFactory>) -> Self {
        self.thread_factory = Some(factory);
        self
    }

    /// Report task faults to `sink` instead of logging them.
    #[must_use]
    pub fn with_fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    /// Validate the configuration and build the scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid.
    pub fn build(self) -> Result<BoundedElasticScheduler, SchedulerError> {
        let thread_factory = self.thread_factory.unwrap_or_else(|| {
            let mut factory = NamedThreadFactory::new(self.config.thread_name_prefix.clone());
            if let Some(stack_size) = self.config.stack_size {
                factory = factory.with_stack_size(stack_size);
            }
            Arc::new(factory)
        });
        let fault_sink = self
            .fault_sink
            .unwrap_or_else(|| Arc::new(TracingFaultSink));
        BoundedElasticScheduler::with_components(self.config, thread_factory, fault_sink)
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
