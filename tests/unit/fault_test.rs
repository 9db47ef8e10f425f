//! Tests for fault sinks

use bounded_elastic::core::{FaultSink, InMemoryFaultSink, TaskFault, TracingFaultSink};

fn fault(task_id: u64) -> TaskFault {
    TaskFault {
        task_id,
        context_id: 0,
        message: format!("task {task_id} failed"),
    }
}

#[test]
fn test_in_memory_sink_keeps_most_recent() {
    let sink = InMemoryFaultSink::new(2);
    assert!(sink.is_empty());

    for id in 0..3 {
        sink.report(fault(id));
    }
    let ids: Vec<_> = sink.faults().iter().map(|f| f.task_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(sink.len(), 2);
}

#[test]
fn test_tracing_sink_accepts_faults() {
    bounded_elastic::util::init_tracing();
    TracingFaultSink.report(fault(7));
}
