//! Dispatcher counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters of a dispatcher.
///
/// All counters are atomic and can be read at any time without locking.
#[derive(Debug, Default)]
pub(crate) struct DispatcherStats {
    queued: AtomicU64,
    rejected: AtomicU64,
    executed: AtomicU64,
    installed: AtomicU64,
    stale: AtomicU64,
    abandoned: AtomicU64,
    flushed_pending: AtomicU64,
    flushed_completed: AtomicU64,
}

impl DispatcherStats {
    pub(crate) fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_installed(&self) {
        self.installed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed_pending(&self, count: usize) {
        self.flushed_pending.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed_completed(&self) {
        self.flushed_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats
    pub(crate) fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            installed: self.installed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            flushed_pending: self.flushed_pending.load(Ordering::Relaxed),
            flushed_completed: self.flushed_completed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of dispatcher statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStatsSnapshot {
    /// Jobs accepted into the input queue.
    pub queued: u64,
    /// Jobs handed back by `try_queue_for_optimization` because the queue was full.
    pub rejected: u64,
    /// Jobs whose background phase returned normally.
    pub executed: u64,
    /// Jobs handed to the pipeline's finalize step.
    pub installed: u64,
    /// Completed jobs dropped because the target already had equal-or-better code.
    pub stale: u64,
    /// Jobs whose background phase panicked; reverted at install time.
    pub abandoned: u64,
    /// Never-started jobs disposed by flush or stop.
    pub flushed_pending: u64,
    /// Completed jobs disposed by flush or stop.
    pub flushed_completed: u64,
}

impl DispatcherStatsSnapshot {
    /// Number of jobs that reached a terminal state.
    pub fn terminal(&self) -> u64 {
        self.installed + self.stale + self.abandoned + self.flushed_pending + self.flushed_completed
    }
}
