//! # Bounded Elastic
//!
//! A bounded, elastic task scheduler for thread-backed pipelines.
//!
//! Many logical sequential streams ("workers") are multiplexed onto a capped
//! pool of cheap backing threads ("contexts"). Each worker guarantees strictly
//! in-order, non-overlapping execution of the tasks submitted to it, while
//! distinct workers run concurrently on up to `cap` contexts.
//!
//! ## Key Features
//!
//! - **Capacity-Bounded Admission**: at most `cap` live contexts; up to
//!   `backlog_cap` further worker requests wait FIFO, the rest are rejected
//! - **Lazy Context Assignment**: a deferred worker buffers its tasks and
//!   flushes them when a released context is handed to it
//! - **Immediate, Delayed and Periodic Tasks**: every task returns a
//!   cancellable [`TaskHandle`](core::TaskHandle)
//! - **Race-Safe Disposal**: tasks, workers and the scheduler may be disposed
//!   repeatedly or concurrently; a disposed worker's pending tasks never start
//! - **Fault Isolation**: a panicking task is reported to a
//!   [`FaultSink`](core::FaultSink) and its context moves on
//!
//! ## Example
//!
//! ```rust
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! use bounded_elastic::builders::SchedulerBuilder;
//! use bounded_elastic::core::Disposable;
//!
//! let scheduler = SchedulerBuilder::default().with_cap(4).with_backlog_cap(16).build()?;
//!
//! let (tx, rx) = mpsc::channel();
//! let worker = scheduler.create_worker()?;
//! for i in 0..3 {
//!     let tx = tx.clone();
//!     worker.schedule(move || tx.send(i).unwrap());
//! }
//! let received: Vec<i32> = rx.iter().take(3).collect();
//! assert_eq!(received, vec![0, 1, 2]);
//!
//! let ticker = scheduler.schedule_periodically(|| {}, Duration::ZERO, Duration::from_millis(10))?;
//! ticker.dispose();
//!
//! scheduler.dispose();
//! # Ok::<(), bounded_elastic::core::SchedulerError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling engine.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Thread factories backing execution contexts.
pub mod runtime;
/// Shared utilities.
pub mod util;
