//! Bounded-elastic scheduler: the top-level facade over admission and workers.
//!
//! # Example
//!
//! ```rust
//! use bounded_elastic::config::SchedulerConfig;
//! use bounded_elastic::core::{BoundedElasticScheduler, Disposable};
//!
//! let scheduler = BoundedElasticScheduler::new(SchedulerConfig::new().with_cap(2))?;
//! scheduler.init()?;
//!
//! let worker = scheduler.create_worker()?;
//! let handle = worker.schedule(|| println!("runs on the worker's context"));
//!
//! worker.dispose();
//! scheduler.dispose();
//! assert!(handle.is_disposed());
//! # Ok::<(), bounded_elastic::core::SchedulerError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;
use crate::runtime::ThreadFactory;

use super::admission::PoolAdmission;
use super::error::SchedulerError;
use super::fault::FaultSink;
use super::task::{Disposable, TaskHandle, TaskId};
use super::worker::{Worker, WorkerId, WorkerInner};

/// Point-in-time capacity statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Maximum number of live contexts.
    pub cap: usize,
    /// Maximum number of queued worker requests.
    pub backlog_cap: usize,
    /// Contexts currently alive.
    pub live_contexts: usize,
    /// Live contexts not granted to any worker.
    pub free_contexts: usize,
    /// Contexts with a task running or queued.
    pub busy_contexts: usize,
    /// Worker requests waiting for a context.
    pub pending_requests: usize,
    /// Workers not yet disposed.
    pub live_workers: usize,
}

/// State shared by the scheduler and every worker it created.
pub(crate) struct SchedulerShared {
    pub(crate) admission: PoolAdmission,
    workers: Mutex<HashMap<WorkerId, Weak<WorkerInner>>>,
    disposed: AtomicBool,
    initialized: AtomicBool,
    next_worker_id: AtomicU64,
    next_task_id: AtomicU64,
}

impl SchedulerShared {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    #[allow(clippy::unused_self)]
    pub(crate) fn now(&self) -> Instant {
        Instant::now()
    }

    pub(crate) fn next_worker_id(&self) -> WorkerId {
        self.next_worker_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_worker(&self, id: WorkerId, worker: &Arc<WorkerInner>) {
        self.workers.lock().insert(id, Arc::downgrade(worker));
    }

    pub(crate) fn forget_worker(&self, id: WorkerId) {
        self.workers.lock().remove(&id);
    }

    fn live_workers(&self) -> Vec<Worker> {
        self.workers
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .map(Worker::from_inner)
            .collect()
    }
}

/// How disposal waits for backing threads.
#[derive(Debug, Clone, Copy)]
enum JoinPolicy {
    Wait,
    Timeout(Duration),
    Detach,
}

/// Scheduler multiplexing sequential workers onto a capped pool of threads.
///
/// At most `cap` contexts are alive at once; up to `backlog_cap` further
/// worker requests wait FIFO for a released context, and anything beyond that
/// is rejected with [`SchedulerError::RejectedExecution`].
pub struct BoundedElasticScheduler {
    shared: Arc<SchedulerShared>,
}

impl BoundedElasticScheduler {
    /// Create a scheduler with named threads and the tracing fault sink.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).build()
    }

    /// Create a scheduler with an explicit thread factory and fault sink.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid.
    pub fn with_components(
        config: SchedulerConfig,
        thread_factory: Arc<dyn ThreadFactory>,
        fault_sink: Arc<dyn FaultSink>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(SchedulerShared {
                admission: PoolAdmission::new(
                    config.cap,
                    config.backlog_cap,
                    thread_factory,
                    fault_sink,
                ),
                workers: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                next_worker_id: AtomicU64::new(0),
                next_task_id: AtomicU64::new(0),
            }),
        })
    }

    /// Start the scheduler. Idempotent; scheduling also starts it implicitly.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Disposed` once the scheduler has been disposed.
    pub fn init(&self) -> Result<(), SchedulerError> {
        if self.shared.is_disposed() {
            return Err(SchedulerError::Disposed);
        }
        self.start();
        Ok(())
    }

    /// Mark the scheduler started, logging the first time only.
    fn start(&self) {
        if !self.shared.is_disposed() && !self.shared.initialized.swap(true, Ordering::AcqRel) {
            info!(
                cap = self.cap(),
                backlog_cap = self.backlog_cap(),
                "bounded elastic scheduler initialized"
            );
        }
    }

    /// Maximum number of live contexts.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.shared.admission.cap()
    }

    /// Maximum number of queued worker requests.
    #[must_use]
    pub fn backlog_cap(&self) -> usize {
        self.shared.admission.backlog_cap()
    }

    /// The scheduler's monotonic clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.shared.now()
    }

    /// Create a worker bound to a reused or new context, or queued for one.
    ///
    /// After `dispose`, the returned worker is already disposed.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::RejectedExecution` if cap and backlog are both exhausted
    /// - `SchedulerError::ThreadSpawn` if a backing thread could not be started
    pub fn create_worker(&self) -> Result<Worker, SchedulerError> {
        self.start();
        Worker::acquire(&self.shared)
    }

    /// Run `action` as soon as possible on a single-use worker.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::RejectedExecution` when no context can be admitted.
    pub fn schedule(
        &self,
        action: impl FnOnce() + Send + 'static,
    ) -> Result<TaskHandle, SchedulerError> {
        self.schedule_after(action, Duration::ZERO)
    }

    /// Run `action` once after `delay` on a single-use worker.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::RejectedExecution` when no context can be admitted.
    pub fn schedule_after(
        &self,
        action: impl FnOnce() + Send + 'static,
        delay: Duration,
    ) -> Result<TaskHandle, SchedulerError> {
        let worker = self.create_worker()?;
        let handle = worker.schedule_after(action, delay);
        Ok(Self::release_on_terminate(worker, handle))
    }

    /// Run `action` after `initial_delay`, then every `period`, on a single-use worker.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::RejectedExecution` when no context can be admitted.
    pub fn schedule_periodically(
        &self,
        action: impl FnMut() + Send + 'static,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<TaskHandle, SchedulerError> {
        let worker = self.create_worker()?;
        let handle = worker.schedule_periodically(action, initial_delay, period);
        Ok(Self::release_on_terminate(worker, handle))
    }

    fn release_on_terminate(worker: Worker, handle: TaskHandle) -> TaskHandle {
        handle.control().on_terminate(move || worker.dispose());
        handle
    }

    /// Current capacity statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let admission = self.shared.admission.snapshot();
        SchedulerStats {
            cap: self.cap(),
            backlog_cap: self.backlog_cap(),
            live_contexts: admission.live,
            free_contexts: admission.free,
            busy_contexts: self.shared.admission.registry().busy(),
            pending_requests: admission.pending,
            live_workers: self.shared.workers.lock().len(),
        }
    }

    /// Dispose like [`Disposable::dispose`], but wait at most `timeout` in
    /// total for the backing threads. Threads still running a task when the
    /// timeout elapses are detached.
    ///
    /// Returns `true` if every backing thread exited.
    pub fn dispose_gracefully(&self, timeout: Duration) -> bool {
        self.shutdown(JoinPolicy::Timeout(timeout))
    }

    fn shutdown(&self, policy: JoinPolicy) -> bool {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return true;
        }
        info!("disposing bounded elastic scheduler");

        let workers = self.shared.live_workers();
        let worker_count = workers.len();
        for worker in workers {
            worker.dispose();
        }

        let contexts = self.shared.admission.shutdown();
        for context in &contexts {
            context.drain_and_stop();
        }
        // One deadline shared by every join.
        let deadline = match policy {
            JoinPolicy::Timeout(timeout) => Instant::now().checked_add(timeout),
            JoinPolicy::Wait | JoinPolicy::Detach => None,
        };
        let mut all_exited = true;
        for context in &contexts {
            all_exited &= match (policy, deadline) {
                (JoinPolicy::Detach, _) => false,
                (JoinPolicy::Timeout(_), Some(deadline)) => {
                    context.join(Some(deadline.saturating_duration_since(Instant::now())))
                }
                (JoinPolicy::Wait | JoinPolicy::Timeout(_), _) => context.join(None),
            };
        }

        info!(
            workers = worker_count,
            contexts = contexts.len(),
            all_exited,
            "bounded elastic scheduler disposed"
        );
        all_exited
    }
}

impl Disposable for BoundedElasticScheduler {
    /// Reject further workers, dispose every live worker, then stop and join
    /// every context.
    fn dispose(&self) {
        self.shutdown(JoinPolicy::Wait);
    }

    fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}

impl Drop for BoundedElasticScheduler {
    fn drop(&mut self) {
        // Stop without joining: a task blocked forever must not hang the drop.
        self.shutdown(JoinPolicy::Detach);
    }
}

impl fmt::Debug for BoundedElasticScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedElasticScheduler")
            .field("stats", &self.stats())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
