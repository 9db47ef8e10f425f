//! Fault sinks receiving failures raised by scheduled actions.
//!
//! A fault never escapes into the context run loop: the loop catches it,
//! builds a [`TaskFault`] and hands it to the configured sink before moving on
//! to the next queued task.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::ContextId;
use super::task::TaskId;

/// A failure raised by a scheduled action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFault {
    /// Task whose action faulted.
    pub task_id: TaskId,
    /// Context the task was running on.
    pub context_id: ContextId,
    /// Panic message, when one could be extracted.
    pub message: String,
}

impl TaskFault {
    /// Build a fault from a caught panic payload.
    pub(crate) fn from_panic(
        task_id: TaskId,
        context_id: ContextId,
        payload: &(dyn Any + Send),
    ) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            task_id,
            context_id,
            message,
        }
    }
}

/// Receiver of task faults.
pub trait FaultSink: Send + Sync {
    /// Report a fault. Called on the faulting context's backing thread.
    fn report(&self, fault: TaskFault);
}

/// Default sink: logs every fault at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, fault: TaskFault) {
        tracing::error!(
            task_id = fault.task_id,
            context_id = fault.context_id,
            message = %fault.message,
            "scheduled task faulted"
        );
    }
}

/// In-memory sink keeping the most recent faults in a bounded buffer.
#[derive(Debug)]
pub struct InMemoryFaultSink {
    faults: Mutex<VecDeque<TaskFault>>,
    max_faults: usize,
}

impl InMemoryFaultSink {
    /// Create a sink retaining at most `max_faults` entries.
    #[must_use]
    pub fn new(max_faults: usize) -> Self {
        Self {
            faults: Mutex::new(VecDeque::with_capacity(max_faults.min(1024))),
            max_faults,
        }
    }

    /// Snapshot of the retained faults, oldest first.
    #[must_use]
    pub fn faults(&self) -> Vec<TaskFault> {
        self.faults.lock().iter().cloned().collect()
    }

    /// Number of retained faults.
    #[must_use]
    pub fn len(&self) -> usize {
        self.faults.lock().len()
    }

    /// Whether no fault has been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faults.lock().is_empty()
    }
}

impl FaultSink for InMemoryFaultSink {
    fn report(&self, fault: TaskFault) {
        let mut faults = self.faults.lock();
        if faults.len() >= self.max_faults {
            faults.pop_front();
        }
        faults.push_back(fault);
    }
}

impl<S: FaultSink + ?Sized> FaultSink for Arc<S> {
    fn report(&self, fault: TaskFault) {
        (**self).report(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(task_id: TaskId) -> TaskFault {
        TaskFault {
            task_id,
            context_id: 0,
            message: format!("boom-{task_id}"),
        }
    }

    #[test]
    fn test_in_memory_sink_is_bounded() {
        let sink = InMemoryFaultSink::new(2);
        sink.report(fault(1));
        sink.report(fault(2));
        sink.report(fault(3));

        let ids: Vec<_> = sink.faults().iter().map(|f| f.task_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_from_panic_extracts_message() {
        let payload: Box<dyn Any + Send> = Box::new("kaboom");
        let fault = TaskFault::from_panic(7, 1, payload.as_ref());
        assert_eq!(fault.message, "kaboom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let fault = TaskFault::from_panic(7, 1, payload.as_ref());
        assert_eq!(fault.message, "owned");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        let fault = TaskFault::from_panic(7, 1, payload.as_ref());
        assert_eq!(fault.message, "non-string panic payload");
    }
}
