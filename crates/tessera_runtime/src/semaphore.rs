//! Counting semaphore for parking idle workers.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A counting semaphore built on a mutex and condition variable.
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with no permits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a permit and wakes one waiter.
    pub fn post(&self) {
        *self.permits.lock() += 1;
        self.available.notify_one();
    }

    /// Adds `n` permits and wakes every waiter.
    pub fn post_many(&self, n: usize) {
        *self.permits.lock() += n;
        self.available.notify_all();
    }

    /// Takes a permit, waiting up to `timeout` for one.
    ///
    /// Returns false if the wait timed out.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            let _ = self
                .available
                .wait_while_for(&mut permits, |p| *p == 0, timeout);
        }
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Takes a permit if one is available.
    pub fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }
}
