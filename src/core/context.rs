//! Sequential execution context backed by one dedicated thread.
//!
//! # Design Principles
//!
//! - **No polling**: the run loop parks on a `Condvar` until the earliest
//!   deadline elapses or a nearer submission wakes it
//! - **Strictly sequential**: the queue lock is released while a task runs, but
//!   only the run loop pops tasks, so one task finishes before the next starts
//! - **Cooperative stop**: `drain_and_stop` cancels queued work and lets the
//!   in-flight task finish; the backing thread is never force-terminated

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::runtime::ThreadFactory;

use super::error::SchedulerError;
use super::fault::{FaultSink, TaskFault};
use super::task::{TaskId, TimedTask};

/// Unique context identifier within one scheduler.
pub type ContextId = u64;

/// Queue entry ordered by `(deadline, sequence)`, earliest first.
struct QueuedTask {
    seq: u64,
    task: TimedTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for the max-heap: earliest deadline, then lowest sequence.
        other
            .task
            .due_key()
            .cmp(&self.task.due_key())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct ContextState {
    queue: BinaryHeap<QueuedTask>,
    next_seq: u64,
    running: Option<TaskId>,
    stopped: bool,
}

impl ContextState {
    fn push(&mut self, task: TimedTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(QueuedTask { seq, task });
    }
}

/// One backing thread executing its queued tasks one at a time in deadline order.
pub struct ExecutionContext {
    id: ContextId,
    state: Mutex<ContextState>,
    wake: Condvar,
    fault_sink: Arc<dyn FaultSink>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: Mutex<Option<ThreadId>>,
}

impl ExecutionContext {
    /// Create a context and start its run loop on a thread from `factory`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ThreadSpawn` if the factory cannot start a thread.
    pub(crate) fn start(
        id: ContextId,
        factory: &dyn ThreadFactory,
        fault_sink: Arc<dyn FaultSink>,
    ) -> Result<Arc<Self>, SchedulerError> {
        let context = Arc::new(Self {
            id,
            state: Mutex::new(ContextState {
                queue: BinaryHeap::new(),
                next_seq: 0,
                running: None,
                stopped: false,
            }),
            wake: Condvar::new(),
            fault_sink,
            thread: Mutex::new(None),
            thread_id: Mutex::new(None),
        });

        let runner = Arc::clone(&context);
        let handle = factory
            .spawn(id, Box::new(move || runner.run_loop()))
            .map_err(|e| SchedulerError::ThreadSpawn(e.to_string()))?;
        *context.thread_id.lock() = Some(handle.thread().id());
        *context.thread.lock() = Some(handle);

        debug!(context_id = id, "execution context started");
        Ok(context)
    }

    /// Identifier of this context.
    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    /// Whether a task is running or waiting on this context.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        let state = self.state.lock();
        state.running.is_some() || !state.queue.is_empty()
    }

    /// Number of queued (not yet started) tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether `drain_and_stop` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Enqueue a task. Hands the task back if the context is stopped.
    pub(crate) fn submit(self: &Arc<Self>, task: TimedTask) -> Result<(), TimedTask> {
        task.control.attach(Arc::downgrade(self));

        let mut state = self.state.lock();
        if state.stopped {
            return Err(task);
        }
        if task.control.state().is_terminal() {
            return Ok(());
        }

        let becomes_head = state
            .queue
            .peek()
            .is_none_or(|head| task.due_key() < head.task.due_key());
        state.push(task);
        drop(state);

        if becomes_head {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Drop a queued task. A running task is left alone.
    pub(crate) fn remove(&self, task_id: TaskId) {
        let mut state = self.state.lock();
        state.queue.retain(|queued| queued.task.control.id() != task_id);
    }

    /// Cancel every queued task, let the in-flight one finish, then stop the loop.
    pub fn drain_and_stop(&self) {
        let drained: Vec<TimedTask> = {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.queue.drain().map(|queued| queued.task).collect()
        };
        self.wake.notify_all();

        debug!(
            context_id = self.id,
            cancelled = drained.len(),
            "execution context draining"
        );
        for task in drained {
            task.control.cancel();
        }
    }

    /// Wait for the backing thread to exit.
    ///
    /// With a timeout, a thread that does not exit in time is detached. A
    /// context never joins its own thread (when disposal runs inside a task).
    /// Returns `true` if the thread is known to have exited.
    pub(crate) fn join(&self, timeout: Option<Duration>) -> bool {
        if *self.thread_id.lock() == Some(thread::current().id()) {
            return false;
        }
        let Some(handle) = self.thread.lock().take() else {
            return true;
        };

        let Some(timeout) = timeout else {
            return handle.join().is_ok();
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let joiner = thread::spawn(move || {
            let _ = tx.send(handle.join().is_ok());
        });
        match rx.recv_timeout(timeout) {
            Ok(clean) => {
                let _ = joiner.join();
                clean
            }
            Err(_) => {
                warn!(
                    context_id = self.id,
                    "context thread did not exit within timeout - detaching"
                );
                false
            }
        }
    }

    fn run_loop(self: Arc<Self>) {
        debug!(context_id = self.id, "context loop started");
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                break;
            }
            match state.queue.peek().map(|head| head.task.deadline) {
                // Empty, or only never-due tasks left: park until a submission.
                None | Some(None) => {
                    self.wake.wait(&mut state);
                    continue;
                }
                Some(Some(deadline)) if deadline > Instant::now() => {
                    self.wake.wait_until(&mut state, deadline);
                    continue;
                }
                Some(Some(_)) => {}
            }
            let Some(QueuedTask { task, .. }) = state.queue.pop() else {
                continue;
            };
            if !task.control.try_start() {
                continue;
            }

            state.running = Some(task.control.id());
            let rearmed = MutexGuard::unlocked(&mut state, || self.execute(task));
            state.running = None;

            if let Some(task) = rearmed {
                if state.stopped {
                    MutexGuard::unlocked(&mut state, || {
                        task.control.cancel();
                    });
                } else {
                    state.push(task);
                }
            }
        }
        debug!(context_id = self.id, "context loop exited");
    }

    /// Run one task to completion. Returns it if it must run again.
    fn execute(&self, mut task: TimedTask) -> Option<TimedTask> {
        let task_id = task.control.id();
        let outcome = catch_unwind(AssertUnwindSafe(|| task.action.invoke()));

        match outcome {
            Ok(()) => match task.period {
                Some(period) if task.control.rearm() => {
                    task.deadline = task.next_deadline(period, Instant::now());
                    Some(task)
                }
                Some(_) => None,
                None => {
                    task.control.complete();
                    None
                }
            },
            Err(payload) => {
                debug!(
                    context_id = self.id,
                    task_id = task_id,
                    owner = task.owner,
                    "task faulted"
                );
                let fault = TaskFault::from_panic(task_id, self.id, payload.as_ref());
                let sink = &self.fault_sink;
                if catch_unwind(AssertUnwindSafe(|| sink.report(fault))).is_err() {
                    warn!(context_id = self.id, task_id, "fault sink panicked");
                }
                // Hooks are crate-internal bookkeeping and do not panic.
                task.control.complete();
                None
            }
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}
