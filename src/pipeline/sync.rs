//! Blocking primitives used by the job queue.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Counting semaphore.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Increment the count and wake one waiter.
    pub fn post(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.available.notify_one();
    }

    /// Block until the count is positive, then decrement it.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self
                .available
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    /// Decrement without blocking. Returns false if the count was zero.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut count, result) = self
            .available
            .wait_timeout_while(count, timeout, |c| *c == 0)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    pub fn value(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
