//! Helpers shared by the integration test crates.

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimal count-down latch built on parking_lot primitives.
#[derive(Clone)]
pub struct Latch {
    inner: Arc<(Mutex<usize>, Condvar)>,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new((Mutex::new(count), Condvar::new())),
        }
    }

    pub fn count_down(&self) {
        let (lock, cvar) = &*self.inner;
        let mut count = lock.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            cvar.notify_all();
        }
    }

    pub fn count(&self) -> usize {
        *self.inner.0.lock()
    }

    /// Wait until the count reaches zero. Returns `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut count = lock.lock();
        while *count > 0 {
            if cvar.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}
