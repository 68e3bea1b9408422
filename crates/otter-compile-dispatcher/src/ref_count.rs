//! In-flight task accounting.
//!
//! Each dispatch task holds an [`InFlightTask`] guard from the moment it is
//! created until it is dropped, whether it ran, found nothing to do, or was
//! discarded by its pool. The owner thread blocks on the barrier until no
//! guard is alive.

use std::sync::Arc;
#[cfg(test)]
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Count of live [`InFlightTask`] guards plus a "reached zero" condition.
#[derive(Default)]
pub struct RefCountBarrier {
    count: Mutex<usize>,
    zero: Condvar,
}

impl RefCountBarrier {
    /// Create a barrier with no outstanding tasks.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register one in-flight task.
    pub fn acquire(self: &Arc<Self>) -> InFlightTask {
        *self.count.lock() += 1;
        InFlightTask {
            barrier: Arc::clone(self),
        }
    }

    /// Number of outstanding tasks.
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Block until every outstanding task has finished.
    pub fn wait_until_zero(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.zero.wait(&mut count);
        }
    }

    /// Block until every outstanding task has finished or `timeout` elapses.
    ///
    /// Returns `true` if the count reached zero.
    #[cfg(test)]
    pub(crate) fn wait_until_zero_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.zero.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    fn release(&self) {
        let mut count = self.count.lock();
        debug_assert!(*count > 0, "in-flight count underflow");
        *count -= 1;
        if *count == 0 {
            self.zero.notify_all();
        }
    }
}

/// Owned registration of one in-flight task. Dropping it decrements the count.
#[must_use = "dropping the guard immediately releases the registration"]
pub struct InFlightTask {
    barrier: Arc<RefCountBarrier>,
}

impl Drop for InFlightTask {
    fn drop(&mut self) {
        self.barrier.release();
    }
}
