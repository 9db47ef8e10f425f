//! Core scheduling engine: tasks, contexts, admission, workers and the scheduler.

pub mod admission;
pub mod context;
pub mod error;
pub mod fault;
pub mod scheduler;
pub mod task;
pub mod worker;

pub use admission::{Admission, AdmissionSnapshot, ContextRegistry, PoolAdmission, RequestId};
pub use context::{ContextId, ExecutionContext};
pub use error::SchedulerError;
pub use fault::{FaultSink, InMemoryFaultSink, TaskFault, TracingFaultSink};
pub use scheduler::{BoundedElasticScheduler, SchedulerStats};
pub use task::{Disposable, TaskHandle, TaskId, TaskState};
pub use worker::{Worker, WorkerId};
