//! Capacity-bounded admission of execution contexts.
//!
//! `PoolAdmission` is the only state touched by unrelated callers. Every
//! mutation of the free set, the pending-request queue and the live count
//! happens under one `parking_lot::Mutex`, which keeps the invariants
//! `live <= cap` and `pending <= backlog_cap` under any interleaving.
//!
//! When the cap is exhausted, `acquire` never blocks: the request is queued
//! FIFO and resolved later by `release`, which hands the context directly to
//! the oldest waiter instead of parking it in the free set.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::runtime::ThreadFactory;

use super::context::{ContextId, ExecutionContext};
use super::error::SchedulerError;
use super::fault::FaultSink;

/// Identifier of a deferred worker-creation request.
pub type RequestId = u64;

/// Callback resolving a deferred request. Returns `false` if the requester
/// no longer wants the context (it was disposed while waiting).
pub(crate) type GrantFn = Box<dyn FnOnce(ContextId) -> bool + Send>;

/// Outcome of a successful [`PoolAdmission::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A context was granted immediately.
    Granted(ContextId),
    /// The request was queued and will be resolved by a later release.
    Deferred(RequestId),
}

/// Arena of live contexts keyed by id. Workers hold keys, never contexts.
#[derive(Default)]
pub struct ContextRegistry {
    contexts: RwLock<HashMap<ContextId, Arc<ExecutionContext>>>,
}

impl ContextRegistry {
    /// Look up a context by id.
    #[must_use]
    pub fn get(&self, id: ContextId) -> Option<Arc<ExecutionContext>> {
        self.contexts.read().get(&id).cloned()
    }

    /// Number of registered contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    /// Whether no context is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }

    /// Count of contexts that have a task running or queued.
    #[must_use]
    pub fn busy(&self) -> usize {
        self.contexts
            .read()
            .values()
            .filter(|context| context.is_busy())
            .count()
    }

    fn insert(&self, context: Arc<ExecutionContext>) {
        self.contexts.write().insert(context.id(), context);
    }

    fn drain(&self) -> Vec<Arc<ExecutionContext>> {
        self.contexts.write().drain().map(|(_, context)| context).collect()
    }
}

struct PendingRequest {
    id: RequestId,
    grant: GrantFn,
}

struct AdmissionState {
    /// Contexts created and not yet torn down (granted + free).
    live: usize,
    free: VecDeque<ContextId>,
    pending: VecDeque<PendingRequest>,
    next_context_id: ContextId,
    next_request_id: RequestId,
    closed: bool,
}

/// Point-in-time view of the admission controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionSnapshot {
    /// Contexts currently alive.
    pub live: usize,
    /// Live contexts not granted to any worker.
    pub free: usize,
    /// Queued worker-creation requests.
    pub pending: usize,
}

/// Capacity controller for execution contexts.
pub struct PoolAdmission {
    cap: usize,
    backlog_cap: usize,
    state: Mutex<AdmissionState>,
    registry: ContextRegistry,
    factory: Arc<dyn ThreadFactory>,
    fault_sink: Arc<dyn FaultSink>,
}

impl PoolAdmission {
    /// Create a controller allowing `cap` live contexts and `backlog_cap`
    /// queued requests beyond that.
    pub(crate) fn new(
        cap: usize,
        backlog_cap: usize,
        factory: Arc<dyn ThreadFactory>,
        fault_sink: Arc<dyn FaultSink>,
    ) -> Self {
        Self {
            cap,
            backlog_cap,
            state: Mutex::new(AdmissionState {
                live: 0,
                free: VecDeque::new(),
                pending: VecDeque::new(),
                next_context_id: 0,
                next_request_id: 0,
                closed: false,
            }),
            registry: ContextRegistry::default(),
            factory,
            fault_sink,
        }
    }

    /// Maximum number of live contexts.
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Maximum number of queued requests.
    #[must_use]
    pub const fn backlog_cap(&self) -> usize {
        self.backlog_cap
    }

    /// The context arena.
    #[must_use]
    pub const fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Look up a live context by id.
    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<Arc<ExecutionContext>> {
        self.registry.get(id)
    }

    /// Request a context: reuse a free one, create one under the cap, or
    /// queue the request. `grant` is kept only when the request is deferred.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::RejectedExecution` if cap and backlog are both exhausted
    /// - `SchedulerError::ThreadSpawn` if a new context could not be started
    /// - `SchedulerError::Disposed` after `shutdown`
    pub(crate) fn acquire(&self, grant: GrantFn) -> Result<Admission, SchedulerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SchedulerError::Disposed);
        }

        if let Some(id) = state.free.pop_front() {
            debug!(context_id = id, "reusing free context");
            return Ok(Admission::Granted(id));
        }

        if state.live < self.cap {
            let id = state.next_context_id;
            let context =
                ExecutionContext::start(id, self.factory.as_ref(), Arc::clone(&self.fault_sink))?;
            state.next_context_id += 1;
            state.live += 1;
            self.registry.insert(context);
            info!(context_id = id, live = state.live, cap = self.cap, "created context");
            return Ok(Admission::Granted(id));
        }

        if state.pending.len() < self.backlog_cap {
            let id = state.next_request_id;
            state.next_request_id += 1;
            state.pending.push_back(PendingRequest { id, grant });
            debug!(request_id = id, pending = state.pending.len(), "worker request deferred");
            return Ok(Admission::Deferred(id));
        }

        warn!(
            cap = self.cap,
            backlog_cap = self.backlog_cap,
            "rejecting worker request: cap and backlog exhausted"
        );
        Err(SchedulerError::RejectedExecution {
            cap: self.cap,
            backlog_cap: self.backlog_cap,
        })
    }

    /// Return a context. The oldest pending request receives it directly;
    /// otherwise it joins the free set.
    pub(crate) fn release(&self, id: ContextId) {
        loop {
            let request = {
                let mut state = self.state.lock();
                if state.closed {
                    return;
                }
                match state.pending.pop_front() {
                    Some(request) => request,
                    None => {
                        debug_assert!(!state.free.contains(&id), "context {id} released twice");
                        state.free.push_back(id);
                        debug!(context_id = id, "context returned to free set");
                        return;
                    }
                }
            };

            // Resolved outside the lock: the grant submits buffered tasks.
            if (request.grant)(id) {
                debug!(context_id = id, request_id = request.id, "context handed to pending request");
                return;
            }
        }
    }

    /// Withdraw a deferred request. Returns `false` if it was already resolved.
    pub(crate) fn cancel_pending(&self, request_id: RequestId) -> bool {
        let mut state = self.state.lock();
        let before = state.pending.len();
        state.pending.retain(|request| request.id != request_id);
        before != state.pending.len()
    }

    /// Close admission and hand back every context for teardown.
    pub(crate) fn shutdown(&self) -> Vec<Arc<ExecutionContext>> {
        let dropped_requests = {
            let mut state = self.state.lock();
            state.closed = true;
            state.free.clear();
            state.live = 0;
            std::mem::take(&mut state.pending)
        };
        // Grants capture worker references; drop them outside the lock.
        drop(dropped_requests);
        self.registry.drain()
    }

    /// Current counts.
    #[must_use]
    pub fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.state.lock();
        AdmissionSnapshot {
            live: state.live,
            free: state.free.len(),
            pending: state.pending.len(),
        }
    }
}

impl fmt::Debug for PoolAdmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAdmission")
            .field("cap", &self.cap)
            .field("backlog_cap", &self.backlog_cap)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}
