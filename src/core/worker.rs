//! Worker handles: caller-facing leases on one sequential execution context.
//!
//! A worker stores the key of its context, never the context itself. It is
//! created either bound (a context was granted right away) or waiting (its
//! request sits in the admission backlog). Tasks scheduled while waiting are
//! buffered and submitted in order once a context is handed over.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::admission::{Admission, GrantFn, RequestId};
use super::context::ContextId;
use super::error::SchedulerError;
use super::scheduler::SchedulerShared;
use super::task::{deadline_after, Disposable, TaskControl, TaskHandle, TaskId, TimedTask};

/// Unique worker identifier within one scheduler.
pub type WorkerId = u64;

enum Binding {
    Waiting {
        request: Option<RequestId>,
        backlog: Vec<TimedTask>,
    },
    Bound(ContextId),
    Disposed,
}

struct WorkerState {
    binding: Binding,
    /// Tasks registered through this worker that have not terminated yet.
    tasks: HashMap<TaskId, Arc<TaskControl>>,
}

pub(crate) struct WorkerInner {
    id: WorkerId,
    shared: Arc<SchedulerShared>,
    state: Mutex<WorkerState>,
    disposed: AtomicBool,
}

impl WorkerInner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let (binding, tasks) = {
            let mut state = self.state.lock();
            (
                mem::replace(&mut state.binding, Binding::Disposed),
                mem::take(&mut state.tasks),
            )
        };

        self.shared.forget_worker(self.id);

        // Cancel before releasing so none of our tasks can start on a context
        // that another worker is about to receive.
        for control in tasks.values() {
            control.cancel();
        }

        match binding {
            Binding::Waiting { request, .. } => {
                if let Some(request) = request {
                    self.shared.admission.cancel_pending(request);
                }
            }
            Binding::Bound(context_id) => self.shared.admission.release(context_id),
            Binding::Disposed => {}
        }
        debug!(worker_id = self.id, cancelled = tasks.len(), "worker disposed");
    }

    /// Bind a waiting worker to `context_id` and flush its buffered tasks.
    fn bind(&self, context_id: ContextId) -> bool {
        let Some(context) = self.shared.admission.context(context_id) else {
            return false;
        };

        let rejected = {
            let mut state = self.state.lock();
            let backlog = match &mut state.binding {
                Binding::Waiting { backlog, .. } => mem::take(backlog),
                Binding::Bound(_) | Binding::Disposed => return false,
            };
            state.binding = Binding::Bound(context_id);

            let mut rejected = Vec::new();
            for task in backlog {
                if let Err(task) = context.submit(task) {
                    rejected.push(task);
                }
            }
            rejected
        };

        for task in rejected {
            task.control.cancel();
        }
        debug!(worker_id = self.id, context_id, "deferred worker bound");
        true
    }

    fn forget_task(&self, task_id: TaskId) {
        self.state.lock().tasks.remove(&task_id);
    }
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A logical sequential execution stream.
///
/// Tasks scheduled on one worker never overlap and run in deadline order,
/// ties broken by submission order. Dropping the last clone of a worker
/// disposes it.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Create a worker and request a context for it.
    pub(crate) fn acquire(shared: &Arc<SchedulerShared>) -> Result<Self, SchedulerError> {
        let worker = Self::waiting(shared);
        if shared.is_disposed() {
            worker.dispose();
            return Ok(worker);
        }

        let weak = Arc::downgrade(&worker.inner);
        let grant: GrantFn = Box::new(move |context_id| {
            weak.upgrade().is_some_and(|inner| inner.bind(context_id))
        });

        match shared.admission.acquire(grant) {
            Ok(Admission::Granted(context_id)) => {
                worker.inner.state.lock().binding = Binding::Bound(context_id);
            }
            Ok(Admission::Deferred(request_id)) => {
                let mut state = worker.inner.state.lock();
                if let Binding::Waiting { request, .. } = &mut state.binding {
                    *request = Some(request_id);
                }
            }
            Err(SchedulerError::Disposed) => {
                worker.dispose();
                return Ok(worker);
            }
            Err(err) => {
                // Never admitted: nothing to release.
                worker.inner.disposed.store(true, Ordering::Release);
                worker.inner.state.lock().binding = Binding::Disposed;
                return Err(err);
            }
        }

        // Registration and the scheduler's disposal cascade are ordered by the
        // registry lock: either the cascade sees this worker or we see the flag.
        shared.register_worker(worker.id(), &worker.inner);
        if shared.is_disposed() {
            worker.dispose();
        }
        Ok(worker)
    }

    fn waiting(shared: &Arc<SchedulerShared>) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                id: shared.next_worker_id(),
                shared: Arc::clone(shared),
                state: Mutex::new(WorkerState {
                    binding: Binding::Waiting {
                        request: None,
                        backlog: Vec::new(),
                    },
                    tasks: HashMap::new(),
                }),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<WorkerInner>) -> Self {
        Self { inner }
    }

    /// Identifier of this worker.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.inner.id
    }

    /// Whether the worker is still waiting in the admission backlog.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self.inner.state.lock().binding, Binding::Waiting { .. })
    }

    /// Context this worker is bound to, if any.
    #[must_use]
    pub fn context_id(&self) -> Option<ContextId> {
        match self.inner.state.lock().binding {
            Binding::Bound(id) => Some(id),
            Binding::Waiting { .. } | Binding::Disposed => None,
        }
    }

    /// Schedule `action` to run as soon as possible.
    pub fn schedule(&self, action: impl FnOnce() + Send + 'static) -> TaskHandle {
        self.schedule_after(action, Duration::ZERO)
    }

    /// Schedule `action` to run once after `delay`.
    pub fn schedule_after(
        &self,
        action: impl FnOnce() + Send + 'static,
        delay: Duration,
    ) -> TaskHandle {
        let shared = &self.inner.shared;
        let deadline = deadline_after(shared.now(), delay);
        let task = TimedTask::once(shared.next_task_id(), self.id(), deadline, action);
        self.submit(task)
    }

    /// Schedule `action` to run after `initial_delay`, then every `period`.
    pub fn schedule_periodically(
        &self,
        action: impl FnMut() + Send + 'static,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle {
        let shared = &self.inner.shared;
        let task = TimedTask::periodic(
            shared.next_task_id(),
            self.id(),
            deadline_after(shared.now(), initial_delay),
            period,
            action,
        );
        self.submit(task)
    }

    fn submit(&self, task: TimedTask) -> TaskHandle {
        let control = Arc::clone(&task.control);
        let handle = TaskHandle::new(Arc::clone(&control));
        if self.is_disposed() {
            control.cancel();
            return handle;
        }

        let task_id = control.id();
        let weak: Weak<WorkerInner> = Arc::downgrade(&self.inner);
        control.on_terminate(move || {
            if let Some(inner) = weak.upgrade() {
                inner.forget_task(task_id);
            }
        });

        let rejected = {
            let mut guard = self.inner.state.lock();
            let WorkerState { binding, tasks } = &mut *guard;
            match binding {
                Binding::Disposed => Some(task),
                Binding::Waiting { backlog, .. } => {
                    tasks.insert(task_id, Arc::clone(&control));
                    backlog.push(task);
                    None
                }
                Binding::Bound(context_id) => {
                    match self.inner.shared.admission.context(*context_id) {
                        Some(context) => match context.submit(task) {
                            Ok(()) => {
                                tasks.insert(task_id, Arc::clone(&control));
                                None
                            }
                            Err(task) => Some(task),
                        },
                        None => Some(task),
                    }
                }
            }
        };

        if let Some(task) = rejected {
            task.control.cancel();
        }
        handle
    }
}

impl Disposable for Worker {
    /// Cancel every not-yet-started task of this worker and release its
    /// context. A task already running is not interrupted.
    fn dispose(&self) {
        self.inner.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id())
            .field("context_id", &self.context_id())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
