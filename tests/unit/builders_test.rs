//! Tests for builder modules

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bounded_elastic::builders::SchedulerBuilder;
use bounded_elastic::config::SchedulerConfig;
use bounded_elastic::core::{Disposable, SchedulerError};
use bounded_elastic::runtime::{NamedThreadFactory, ThreadFactory};

/// Factory counting the threads it started.
struct CountingFactory {
    inner: NamedThreadFactory,
    spawned: AtomicU64,
}

impl ThreadFactory for CountingFactory {
    fn spawn(&self, index: u64, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(index, body)
    }
}

/// Factory that can never start a thread.
struct FailingFactory;

impl ThreadFactory for FailingFactory {
    fn spawn(&self, _index: u64, _body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
        Err(io::Error::other("no threads left"))
    }
}

#[test]
fn test_scheduler_builder_defaults() {
    let builder = SchedulerBuilder::default();
    assert_eq!(builder.config(), &SchedulerConfig::default());

    let builder = SchedulerBuilder::new(SchedulerConfig::new()).with_cap(2).with_backlog_cap(7);
    assert_eq!(builder.config().cap, 2);
    assert_eq!(builder.config().backlog_cap, 7);

    let scheduler = builder.build().unwrap();
    assert_eq!(scheduler.cap(), 2);
    assert_eq!(scheduler.backlog_cap(), 7);
    scheduler.dispose();
}

#[test]
fn test_scheduler_builder_rejects_invalid_config() {
    let result = SchedulerBuilder::default().with_cap(0).build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_scheduler_builder_uses_thread_factory() {
    let factory = Arc::new(CountingFactory {
        inner: NamedThreadFactory::new("counted"),
        spawned: AtomicU64::new(0),
    });
    let scheduler = SchedulerBuilder::default()
        .with_cap(2)
        .with_thread_factory(factory.clone())
        .build()
        .unwrap();

    let first = scheduler.create_worker().unwrap();
    let second = scheduler.create_worker().unwrap();
    assert_eq!(factory.spawned.load(Ordering::SeqCst), 2);

    // A released context is reused, not respawned.
    first.dispose();
    let third = scheduler.create_worker().unwrap();
    assert_eq!(factory.spawned.load(Ordering::SeqCst), 2);

    second.dispose();
    third.dispose();
    scheduler.dispose();
}

#[test]
fn test_scheduler_builder_surfaces_spawn_failure() {
    let scheduler = SchedulerBuilder::default()
        .with_cap(1)
        .with_thread_factory(Arc::new(FailingFactory))
        .build()
        .unwrap();

    assert!(matches!(
        scheduler.create_worker(),
        Err(SchedulerError::ThreadSpawn(msg)) if msg.contains("no threads left")
    ));
    // The failed spawn did not consume capacity.
    assert_eq!(scheduler.stats().live_contexts, 0);
    scheduler.dispose();
}
