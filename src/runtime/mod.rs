//! Runtime adapters supplying backing threads of control.

pub mod thread_factory;

pub use thread_factory::{NamedThreadFactory, ThreadFactory};
