//! Fixed-capacity input queue.
//!
//! Jobs are stored in a circular buffer addressed by `(shift + index) % capacity`
//! so the queue never reallocates after construction. Every operation takes the
//! single queue lock for O(1) work and never waits for space or for an item.

use parking_lot::Mutex;

use crate::job::{CompileJob, CompilePipeline};

struct InputQueueState<P: CompilePipeline> {
    slots: Box<[Option<CompileJob<P>>]>,
    shift: usize,
    len: usize,
}

impl<P: CompilePipeline> InputQueueState<P> {
    fn index(&self, i: usize) -> usize {
        (self.shift + i) % self.slots.len()
    }

    fn pop_front(&mut self) -> Option<CompileJob<P>> {
        if self.len == 0 {
            return None;
        }
        let front = self.index(0);
        let job = self.slots[front].take();
        debug_assert!(job.is_some(), "occupied slot must hold a job");
        self.shift = self.index(1);
        self.len -= 1;
        job
    }
}

/// Bounded FIFO of jobs waiting for a worker.
pub(crate) struct BoundedInputQueue<P: CompilePipeline> {
    state: Mutex<InputQueueState<P>>,
}

impl<P: CompilePipeline> BoundedInputQueue<P> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "input queue capacity must be non-zero");
        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>();
        Self {
            state: Mutex::new(InputQueueState {
                slots: slots.into_boxed_slice(),
                shift: 0,
                len: 0,
            }),
        }
    }

    /// Append a job at the tail.
    ///
    /// # Panics
    ///
    /// Panics if the queue is full. Callers check [`Self::is_available`] first.
    pub(crate) fn push(&self, job: CompileJob<P>) {
        let mut state = self.state.lock();
        assert!(
            state.len < state.slots.len(),
            "input queue overflow (capacity {})",
            state.slots.len()
        );
        let tail = state.index(state.len);
        state.slots[tail] = Some(job);
        state.len += 1;
    }

    /// Append a job unless the queue is full, in which case it is handed back.
    pub(crate) fn try_push(&self, job: CompileJob<P>) -> Result<(), CompileJob<P>> {
        let mut state = self.state.lock();
        if state.len == state.slots.len() {
            return Err(job);
        }
        let tail = state.index(state.len);
        state.slots[tail] = Some(job);
        state.len += 1;
        Ok(())
    }

    /// Remove and return the oldest job.
    pub(crate) fn pop_front(&self) -> Option<CompileJob<P>> {
        self.state.lock().pop_front()
    }

    /// Remove every queued job, oldest first.
    ///
    /// The jobs are returned rather than disposed here so that disposal runs
    /// outside the queue lock.
    pub(crate) fn drain(&self) -> Vec<CompileJob<P>> {
        let mut state = self.state.lock();
        let mut drained = Vec::with_capacity(state.len);
        while let Some(job) = state.pop_front() {
            drained.push(job);
        }
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub(crate) fn is_available(&self) -> bool {
        let state = self.state.lock();
        state.len < state.slots.len()
    }
}
