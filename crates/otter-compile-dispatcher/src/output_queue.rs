//! Completed jobs awaiting installation, in completion order.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::job::{CompileJob, CompilePipeline};

/// Unbounded FIFO filled by workers and drained by the owner thread.
pub(crate) struct OutputQueue<P: CompilePipeline> {
    jobs: Mutex<VecDeque<CompileJob<P>>>,
}

impl<P: CompilePipeline> OutputQueue<P> {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, job: CompileJob<P>) {
        self.jobs.lock().push_back(job);
    }

    pub(crate) fn pop(&self) -> Option<CompileJob<P>> {
        self.jobs.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
