//! The unit of work handed to the thread pool.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use tracing::{error, trace};

use crate::dispatcher::DispatcherShared;
use crate::job::{CompileJob, CompilePipeline, WorkerContext};
use crate::ref_count::InFlightTask;

/// Type-erased task runnable on any worker thread.
pub trait WorkerTask: Send + 'static {
    /// Run the task to completion on the calling thread.
    fn run(self: Box<Self>);
}

/// Thread pool the dispatcher posts tasks to.
///
/// Posting is fire-and-forget. A runner may also drop a task without running
/// it; the dispatcher only requires that every posted task is eventually
/// either run or dropped.
pub trait TaskRunner: Send + Sync {
    /// Schedule `task` on some worker thread.
    fn post_task(&self, task: Box<dyn WorkerTask>);
}

/// Pulls one job from the input queue, executes it, and publishes the result.
pub(crate) struct CompileTask<P: CompilePipeline> {
    shared: Arc<DispatcherShared<P>>,
    _in_flight: InFlightTask,
}

impl<P: CompilePipeline> CompileTask<P> {
    /// Create a task, registering it as in flight.
    pub(crate) fn new(shared: Arc<DispatcherShared<P>>) -> Self {
        let in_flight = shared.in_flight.acquire();
        Self {
            shared,
            _in_flight: in_flight,
        }
    }
}

impl<P: CompilePipeline> WorkerTask for CompileTask<P> {
    fn run(self: Box<Self>) {
        let shared = &self.shared;
        let mut ctx = WorkerContext::enter(shared.id);

        let delay = shared.config.recompilation_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        compile_next(shared, shared.input.pop_front(), &mut ctx);
        drop(ctx);
        // `self` drops here, releasing the in-flight registration after the
        // result has been published.
    }
}

fn compile_next<P: CompilePipeline>(
    shared: &DispatcherShared<P>,
    job: Option<CompileJob<P>>,
    ctx: &mut WorkerContext,
) {
    let Some(mut job) = job else {
        trace!("no pending compile job");
        return;
    };
    ctx.record_job(job.id());

    let outcome = catch_unwind(AssertUnwindSafe(|| job.execute(&shared.pipeline, ctx)));
    match outcome {
        Ok(()) => {
            shared.stats.record_executed();
            trace!(status = ?job.status(), "compile job executed");
        }
        // The job goes to the output queue without a status and is reverted
        // at install time.
        Err(_) => error!(job = %job.id(), "compile pipeline panicked"),
    }

    shared.output.push(job);

    if shared.config.finalize {
        shared.install_requested.store(true, Ordering::Release);
        shared.pipeline.request_install_code();
    }
}
