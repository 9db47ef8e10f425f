//! Thread factory abstraction used to start each context's backing thread.

use std::io;
use std::thread::{self, JoinHandle};

/// Supplies the backing thread of control for each new execution context.
pub trait ThreadFactory: Send + Sync {
    /// Start `body` on a new thread. `index` is the id of the context it backs.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the thread cannot be created.
    fn spawn(&self, index: u64, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>;
}

/// Factory naming threads `"{prefix}-{index}"`.
#[derive(Debug, Clone)]
pub struct NamedThreadFactory {
    prefix: String,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    /// Create a factory with the given thread-name prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stack_size: None,
        }
    }

    /// Set an explicit stack size for spawned threads.
    #[must_use]
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Thread-name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(&self, index: u64, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(format!("{}-{index}", self.prefix));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threads_are_named_by_index() {
        let factory = NamedThreadFactory::new("elastic").with_stack_size(256 * 1024);
        let handle = factory
            .spawn(
                4,
                Box::new(|| {
                    assert_eq!(thread::current().name(), Some("elastic-4"));
                }),
            )
            .unwrap();
        assert_eq!(handle.thread().name(), Some("elastic-4"));
        handle.join().unwrap();
    }
}
