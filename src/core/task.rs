//! Timed tasks, their cancellation state, and the caller-facing handle.
//!
//! A task's lifecycle is a small state machine driven by compare-and-swap:
//!
//! ```text
//! Pending --try_start--> Running --complete--> Completed
//!    ^                      |
//!    +-------rearm----------+        (periodic tasks only)
//!
//! Pending | Running --cancel--> Cancelled
//! ```
//!
//! Whoever wins the `Pending` transition decides the outcome: a cancel that
//! lands first guarantees the run loop never starts the task, and a start that
//! lands first means the cancel only suppresses future recurrences.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::context::ExecutionContext;
use super::worker::WorkerId;

/// Unique task identifier within one scheduler.
pub type TaskId = u64;

/// Anything that can be disposed exactly once and queried afterwards.
pub trait Disposable {
    /// Dispose the resource. Idempotent and safe to race.
    fn dispose(&self);
    /// Whether the resource has been disposed (or has otherwise terminated).
    fn is_disposed(&self) -> bool;
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Waiting for its deadline (or for its worker to be granted a context).
    Pending = 0,
    /// Currently executing on its context.
    Running = 1,
    /// Cancelled before or during execution.
    Cancelled = 2,
    /// Ran to completion and will not run again.
    Completed = 3,
}

impl TaskState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Cancelled,
            _ => Self::Completed,
        }
    }

    /// Whether the task can no longer run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Shared cancellation state of one task.
///
/// The queue entry ([`TimedTask`]) owns the action; everything else that needs
/// to observe or cancel the task holds an `Arc<TaskControl>`.
pub(crate) struct TaskControl {
    id: TaskId,
    periodic: bool,
    state: AtomicU8,
    /// Context queue currently holding the task, if it has been submitted.
    context: Mutex<Option<Weak<ExecutionContext>>>,
    /// Termination hooks. `None` once the task reached a terminal state.
    hooks: Mutex<Option<Vec<Hook>>>,
}

impl TaskControl {
    pub(crate) fn new(id: TaskId, periodic: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            periodic,
            state: AtomicU8::new(TaskState::Pending as u8),
            context: Mutex::new(None),
            hooks: Mutex::new(Some(Vec::new())),
        })
    }

    pub(crate) const fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record the context queue now holding this task.
    pub(crate) fn attach(&self, context: Weak<ExecutionContext>) {
        *self.context.lock() = Some(context);
    }

    /// Claim the task for execution. Fails if it was cancelled first.
    pub(crate) fn try_start(&self) -> bool {
        self.transition(TaskState::Pending, TaskState::Running)
    }

    /// Return a periodic task to `Pending` after a successful run.
    pub(crate) fn rearm(&self) -> bool {
        self.transition(TaskState::Running, TaskState::Pending)
    }

    /// Mark a started task as finished and fire its termination hooks.
    pub(crate) fn complete(&self) {
        if self.transition(TaskState::Running, TaskState::Completed) {
            self.run_hooks();
        }
    }

    /// Cancel the task. Returns `true` if this call performed the cancellation.
    pub(crate) fn cancel(&self) -> bool {
        let mut current = self.state();
        loop {
            if current.is_terminal() {
                return false;
            }
            match self.state.compare_exchange(
                current as u8,
                TaskState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = TaskState::from_u8(actual),
            }
        }

        if current == TaskState::Pending {
            let context = self.context.lock().take();
            if let Some(context) = context.and_then(|weak| weak.upgrade()) {
                context.remove(self.id);
            }
        }
        self.run_hooks();
        true
    }

    /// Run `hook` once the task terminates, or right away if it already has.
    pub(crate) fn on_terminate(&self, hook: impl FnOnce() + Send + 'static) {
        let mut hooks = self.hooks.lock();
        if let Some(pending) = hooks.as_mut() {
            pending.push(Box::new(hook));
        } else {
            drop(hooks);
            hook();
        }
    }

    fn run_hooks(&self) {
        let hooks = self.hooks.lock().take();
        for hook in hooks.into_iter().flatten() {
            hook();
        }
    }
}

impl fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("id", &self.id)
            .field("periodic", &self.periodic)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// The opaque callable behind a task.
pub(crate) enum Action {
    /// Runs at most once.
    Once(Option<Box<dyn FnOnce() + Send>>),
    /// Runs once per period.
    Repeat(Box<dyn FnMut() + Send>),
}

impl Action {
    pub(crate) fn invoke(&mut self) {
        match self {
            Self::Once(action) => {
                if let Some(action) = action.take() {
                    action();
                }
            }
            Self::Repeat(action) => action(),
        }
    }
}

/// `base + delay`, or `None` ("never due") when the sum is not representable.
pub(crate) fn deadline_after(base: Instant, delay: Duration) -> Option<Instant> {
    base.checked_add(delay)
}

/// A unit of work waiting in, or running on, a context queue.
pub(crate) struct TimedTask {
    pub(crate) control: Arc<TaskControl>,
    pub(crate) action: Action,
    /// `None` means the task is never due: it waits until cancelled.
    pub(crate) deadline: Option<Instant>,
    pub(crate) period: Option<Duration>,
    pub(crate) owner: WorkerId,
}

impl TimedTask {
    pub(crate) fn once(
        id: TaskId,
        owner: WorkerId,
        deadline: Option<Instant>,
        action: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            control: TaskControl::new(id, false),
            action: Action::Once(Some(Box::new(action))),
            deadline,
            period: None,
            owner,
        }
    }

    pub(crate) fn periodic(
        id: TaskId,
        owner: WorkerId,
        deadline: Option<Instant>,
        period: Duration,
        action: impl FnMut() + Send + 'static,
    ) -> Self {
        Self {
            control: TaskControl::new(id, true),
            action: Action::Repeat(Box::new(action)),
            deadline,
            period: Some(period),
            owner,
        }
    }

    /// Queue ordering key: due tasks by deadline, never-due tasks last.
    pub(crate) fn due_key(&self) -> (bool, Option<Instant>) {
        (self.deadline.is_none(), self.deadline)
    }

    /// Deadline of the next occurrence after a successful run.
    pub(crate) fn next_deadline(&self, period: Duration, now: Instant) -> Option<Instant> {
        if period.is_zero() {
            // Behind everything already due on the same context.
            Some(now)
        } else {
            self.deadline.and_then(|deadline| deadline.checked_add(period))
        }
    }
}

/// Caller-facing cancellable handle to a scheduled task.
///
/// A one-shot task's handle reports disposed once the task ran or was
/// cancelled. A periodic task's handle stays live until it is disposed
/// explicitly (or its worker or scheduler is disposed).
#[derive(Clone)]
pub struct TaskHandle {
    control: Arc<TaskControl>,
}

impl TaskHandle {
    pub(crate) const fn new(control: Arc<TaskControl>) -> Self {
        Self { control }
    }

    pub(crate) const fn control(&self) -> &Arc<TaskControl> {
        &self.control
    }

    /// Identifier of the task.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.control.id()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    /// Whether the task was scheduled with a period.
    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.control.periodic
    }
}

impl Disposable for TaskHandle {
    fn dispose(&self) {
        self.control.cancel();
    }

    fn is_disposed(&self) -> bool {
        self.control.state().is_terminal()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.control).finish()
    }
}
