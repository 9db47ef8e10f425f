//! Tests for thread factories

use std::sync::mpsc;
use std::thread;

use bounded_elastic::runtime::{NamedThreadFactory, ThreadFactory};

#[test]
fn test_named_thread_factory_spawn() {
    let factory = NamedThreadFactory::new("boundedElastic");
    assert_eq!(factory.prefix(), "boundedElastic");

    let (tx, rx) = mpsc::channel();
    let handle = factory
        .spawn(
            12,
            Box::new(move || {
                tx.send(thread::current().name().map(str::to_owned)).unwrap();
            }),
        )
        .unwrap();

    assert_eq!(rx.recv().unwrap().as_deref(), Some("boundedElastic-12"));
    handle.join().unwrap();
}
