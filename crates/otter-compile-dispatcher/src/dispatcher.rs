//! Owner-side coordination of background optimizing compiles.
//!
//! The owner thread queues jobs, and each queued job is matched by one
//! dispatch task posted to the thread pool. Workers publish finished jobs to
//! the output queue; nothing is installed until the owner calls
//! [`OptimizingCompileDispatcher::install_optimized_functions`].
//!
//! Three locks guard shared state (input queue, output queue, in-flight
//! count) and no code path holds two of them at once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::error::DispatchResult;
use crate::input_queue::BoundedInputQueue;
use crate::job::{CompileJob, CompilePipeline, JobId, OwnerContext, dispose};
use crate::output_queue::OutputQueue;
use crate::ref_count::RefCountBarrier;
use crate::stats::{DispatcherStats, DispatcherStatsSnapshot};
use crate::task::{CompileTask, TaskRunner};

/// Whether a flush waits for in-flight tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingBehavior {
    /// Wait for every in-flight task, then discard its result too.
    Block,
    /// Discard only never-started jobs; in-flight results stay queued.
    DontBlock,
}

impl fmt::Display for BlockingBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingBehavior::Block => f.write_str("blocking"),
            BlockingBehavior::DontBlock => f.write_str("non blocking"),
        }
    }
}

/// State shared between the owner and the worker tasks.
///
/// Results published after the dispatcher is dropped are freed together with
/// this state, which amounts to `dispose(job, false)` without the trace.
pub(crate) struct DispatcherShared<P: CompilePipeline> {
    pub(crate) id: u64,
    pub(crate) config: DispatcherConfig,
    pub(crate) pipeline: P,
    pub(crate) input: BoundedInputQueue<P>,
    pub(crate) output: OutputQueue<P>,
    pub(crate) in_flight: Arc<RefCountBarrier>,
    pub(crate) install_requested: AtomicBool,
    pub(crate) stats: DispatcherStats,
}

/// Background optimizing-compile dispatcher owned by one runtime thread.
///
/// Owner-only operations take `&mut self`, so whoever holds the dispatcher is
/// the owner thread. The dispatcher may be moved to another thread.
pub struct OptimizingCompileDispatcher<P: CompilePipeline> {
    shared: Arc<DispatcherShared<P>>,
    runner: Arc<dyn TaskRunner>,
}

impl<P: CompilePipeline> OptimizingCompileDispatcher<P> {
    /// Create a dispatcher posting its tasks to `runner`.
    pub fn new(
        config: DispatcherConfig,
        pipeline: P,
        runner: Arc<dyn TaskRunner>,
    ) -> DispatchResult<Self> {
        config.validate()?;

        static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed);

        debug!(
            dispatcher = id,
            capacity = config.queue_capacity,
            delay_ms = config.recompilation_delay.as_millis() as u64,
            "created optimizing compile dispatcher"
        );

        Ok(Self {
            shared: Arc::new(DispatcherShared {
                id,
                input: BoundedInputQueue::new(config.queue_capacity),
                output: OutputQueue::new(),
                in_flight: RefCountBarrier::new(),
                install_requested: AtomicBool::new(false),
                stats: DispatcherStats::default(),
                pipeline,
                config,
            }),
            runner,
        })
    }

    /// Whether the input queue has room for another job.
    pub fn is_queue_available(&self) -> bool {
        self.shared.input.is_available()
    }

    /// Queue a job and post one task to pick it up.
    ///
    /// # Panics
    ///
    /// Panics if the input queue is full; check [`Self::is_queue_available`]
    /// first.
    pub fn queue_for_optimization(&mut self, job: CompileJob<P>) {
        let id = job.id();
        self.shared.input.push(job);
        self.post_compile_task(id);
    }

    /// Queue a job if there is room, otherwise hand it back.
    pub fn try_queue_for_optimization(&mut self, job: CompileJob<P>) -> Result<(), CompileJob<P>> {
        let id = job.id();
        match self.shared.input.try_push(job) {
            Ok(()) => {
                self.post_compile_task(id);
                Ok(())
            }
            Err(job) => {
                self.shared.stats.record_rejected();
                Err(job)
            }
        }
    }

    fn post_compile_task(&self, id: JobId) {
        self.shared.stats.record_queued();
        debug!(dispatcher = self.shared.id, job = %id, "queued job for optimization");
        let task = CompileTask::new(Arc::clone(&self.shared));
        self.runner.post_task(Box::new(task));
    }

    /// Whether any task is in flight or any result awaits installation.
    pub fn has_jobs(&self) -> bool {
        // Workers only push output while registered as in flight, so reading
        // the count first makes an empty output queue conclusive.
        self.shared.in_flight.count() != 0 || !self.shared.output.is_empty()
    }

    /// Whether a worker has published a result since the last install pass.
    pub fn is_install_requested(&self) -> bool {
        self.shared.install_requested.load(Ordering::Acquire)
    }

    /// Install every completed job, in completion order.
    ///
    /// A non-OSR job whose target already runs code of the same or a higher
    /// tier is dropped without touching the target.
    pub fn install_optimized_functions(&mut self) {
        self.shared.install_requested.store(false, Ordering::Release);
        let ctx = OwnerContext::current(self.shared.config.trace);

        while let Some(job) = self.shared.output.pop() {
            // Checked before the status: existing code of the same or a higher
            // tier stays valid even if this job's compile panicked.
            if !job.is_osr() && job.target().code_kind() >= job.code_kind() {
                if self.shared.config.trace {
                    info!(
                        function = job.target().name(),
                        "aborting compilation as it has already been optimized"
                    );
                } else {
                    debug!(job = %job.id(), function = job.target().name(), "dropping stale job");
                }
                self.shared.stats.record_stale();
                dispose(job, false);
                continue;
            }

            if job.status().is_none() {
                warn!(job = %job.id(), function = job.target().name(), "reverting job without a result");
                self.shared.stats.record_abandoned();
                dispose(job, true);
                continue;
            }

            self.shared.stats.record_installed();
            self.shared.pipeline.finalize(job, &ctx);
        }
    }

    /// Discard all queued work, reverting every affected target.
    ///
    /// Never-started jobs are disposed immediately. With
    /// [`BlockingBehavior::Block`] this also waits for in-flight tasks and
    /// disposes their results; otherwise those results stay queued for a
    /// later install or stop.
    pub fn flush(&mut self, blocking: BlockingBehavior) {
        self.flush_queues(blocking, true);
        if self.shared.config.trace {
            info!(mode = %blocking, "flushed concurrent recompilation queues");
        } else {
            debug!(mode = %blocking, "flushed concurrent recompilation queues");
        }
    }

    /// Drain everything for shutdown.
    ///
    /// Like a blocking flush, except completed results are dropped without
    /// reverting their targets.
    pub fn stop(&mut self) {
        self.flush_queues(BlockingBehavior::Block, false);
        debug_assert!(self.shared.input.is_empty());
        debug!(dispatcher = self.shared.id, "stopped optimizing compile dispatcher");
    }

    /// Block until no task is in flight.
    ///
    /// This does not drain the input queue.
    pub fn await_compile_tasks(&mut self) {
        self.shared.in_flight.wait_until_zero();
        debug_assert!(
            self.shared.input.is_empty(),
            "all compile tasks finished with jobs still queued"
        );
    }

    fn flush_queues(&mut self, blocking: BlockingBehavior, restore_function_code: bool) {
        self.flush_input_queue();
        if blocking == BlockingBehavior::Block {
            self.shared.in_flight.wait_until_zero();
        }
        self.flush_output_queue(restore_function_code);
    }

    fn flush_input_queue(&self) {
        let pending = self.shared.input.drain();
        self.shared.stats.record_flushed_pending(pending.len());
        for job in pending {
            dispose(job, true);
        }
    }

    fn flush_output_queue(&self, restore_function_code: bool) {
        while let Some(job) = self.shared.output.pop() {
            self.shared.stats.record_flushed_completed();
            dispose(job, restore_function_code);
        }
    }

    /// Number of jobs waiting for a worker.
    pub fn queue_length(&self) -> usize {
        self.shared.input.len()
    }

    /// Input queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.shared.input.capacity()
    }

    /// Number of completed jobs awaiting installation.
    pub fn output_length(&self) -> usize {
        self.shared.output.len()
    }

    /// Number of posted tasks that have not finished.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.count()
    }

    /// Snapshot the dispatcher counters.
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    /// The compiler pipeline.
    pub fn pipeline(&self) -> &P {
        &self.shared.pipeline
    }
}

impl<P: CompilePipeline> Drop for OptimizingCompileDispatcher<P> {
    fn drop(&mut self) {
        if self.shared.input.is_empty() && !self.has_jobs() {
            return;
        }
        // Does not wait: results still in flight are dropped with the shared
        // state once their tasks finish, which is what `stop` would do.
        debug!(
            dispatcher = self.shared.id,
            in_flight = self.shared.in_flight.count(),
            "dropping dispatcher with outstanding work"
        );
        self.flush_queues(BlockingBehavior::DontBlock, false);
    }
}

impl<P: CompilePipeline> fmt::Debug for OptimizingCompileDispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizingCompileDispatcher")
            .field("id", &self.shared.id)
            .field("queue_length", &self.queue_length())
            .field("output_length", &self.output_length())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
