//! Compilation jobs and the collaborator traits the dispatcher drives.
//!
//! A [`CompileJob`] is move-only: at any instant it lives in exactly one of the
//! input queue, the worker executing it, the output queue, or nowhere (it was
//! installed or disposed). The dispatcher never clones or aliases a job.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use tracing::span::EnteredSpan;

/// Code tier, ordered from least to most optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CodeKind {
    /// Bytecode interpreter
    Interpreter,
    /// Baseline (non-optimizing) JIT
    Baseline,
    /// Mid-tier optimizing JIT
    MidTier,
    /// Top-tier optimizing JIT
    TopTier,
}

/// Process-unique job identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a job. Transitions only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState<S> {
    /// Waiting in the input queue
    Queued,
    /// Owned by a worker that is running the pipeline
    Executing,
    /// Pipeline finished; waiting in the output queue
    Completed {
        /// Status reported by the pipeline
        status: S,
    },
    /// Discarded without installation
    Disposed,
}

/// Immutable description of a job, visible to the pipeline on the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobInfo {
    /// Job identity.
    pub id: JobId,
    /// Tier the job produces.
    pub code_kind: CodeKind,
    /// Whether this is an on-stack-replacement job.
    pub osr: bool,
}

/// The function a job optimizes, as seen by the dispatcher.
///
/// These calls are made on the owner thread only.
pub trait OptimizationTarget: Send + Sync {
    /// Human-readable name for tracing.
    fn name(&self) -> &str;

    /// Tier of the code currently installed on the target.
    fn code_kind(&self) -> CodeKind;

    /// Make the target run its baseline code again.
    fn restore_baseline_code(&self);

    /// Whether the target is still marked as queued for optimization.
    fn is_in_optimization_queue(&self) -> bool;

    /// Clear the queued-for-optimization marker.
    fn clear_optimization_marker(&self);

    /// Set or clear the OSR-pending flag.
    fn set_osr_in_optimization_queue(&self, pending: bool);
}

/// The compiler pipeline that executes and installs jobs.
pub trait CompilePipeline: Send + Sync + Sized + 'static {
    /// Pipeline-specific compilation state carried by each job.
    type Unit: Send + 'static;

    /// Outcome of the background phase. Opaque to the dispatcher.
    type Status: Send + fmt::Debug + 'static;

    /// Run the background phase of a job on a worker thread.
    ///
    /// Must not touch state owned by the runtime's main thread. Failures are
    /// reported through the returned status, never by panicking.
    fn execute(
        &self,
        unit: &mut Self::Unit,
        info: &JobInfo,
        ctx: &mut WorkerContext,
    ) -> Self::Status;

    /// Install a completed job. Called on the owner thread; takes ownership
    /// of the job and is responsible for disposing of it.
    fn finalize(&self, job: CompileJob<Self>, ctx: &OwnerContext);

    /// Hint that completed jobs are waiting for installation.
    ///
    /// Called from worker threads; implementations usually poke an interrupt
    /// flag checked by the main thread.
    fn request_install_code(&self) {}
}

/// A unit of optimization work.
pub struct CompileJob<P: CompilePipeline> {
    info: JobInfo,
    target: Arc<dyn OptimizationTarget>,
    state: JobState<P::Status>,
    unit: P::Unit,
}

impl<P: CompilePipeline> CompileJob<P> {
    /// Create a job producing `code_kind` code for `target`.
    pub fn new(
        target: Arc<dyn OptimizationTarget>,
        code_kind: CodeKind,
        osr: bool,
        unit: P::Unit,
    ) -> Self {
        Self {
            info: JobInfo {
                id: JobId::next(),
                code_kind,
                osr,
            },
            target,
            state: JobState::Queued,
            unit,
        }
    }

    /// Job identity.
    pub fn id(&self) -> JobId {
        self.info.id
    }

    /// Immutable job description.
    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    /// The function being optimized.
    pub fn target(&self) -> &Arc<dyn OptimizationTarget> {
        &self.target
    }

    /// Tier this job produces.
    pub fn code_kind(&self) -> CodeKind {
        self.info.code_kind
    }

    /// Whether this is an on-stack-replacement job.
    pub fn is_osr(&self) -> bool {
        self.info.osr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &JobState<P::Status> {
        &self.state
    }

    /// Pipeline status, once the job has completed.
    pub fn status(&self) -> Option<&P::Status> {
        match &self.state {
            JobState::Completed { status } => Some(status),
            _ => None,
        }
    }

    /// Pipeline payload.
    pub fn unit(&self) -> &P::Unit {
        &self.unit
    }

    /// Mutable pipeline payload.
    pub fn unit_mut(&mut self) -> &mut P::Unit {
        &mut self.unit
    }

    /// Consume the job, keeping only its payload.
    pub fn into_unit(self) -> P::Unit {
        self.unit
    }

    pub(crate) fn execute(&mut self, pipeline: &P, ctx: &mut WorkerContext) {
        debug_assert!(matches!(self.state, JobState::Queued));
        self.state = JobState::Executing;
        let status = pipeline.execute(&mut self.unit, &self.info, ctx);
        self.state = JobState::Completed { status };
    }
}

impl<P: CompilePipeline> fmt::Debug for CompileJob<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileJob")
            .field("id", &self.info.id)
            .field("target", &self.target.name())
            .field("code_kind", &self.info.code_kind)
            .field("osr", &self.info.osr)
            .field("state", &self.state)
            .finish()
    }
}

/// Discard a job, optionally reverting its target to baseline code.
///
/// Reversion is required whenever the job will never produce code, so the
/// target does not stay marked as waiting for an optimization that will not
/// arrive.
pub(crate) fn dispose<P: CompilePipeline>(mut job: CompileJob<P>, restore_function_code: bool) {
    if restore_function_code {
        let target = &job.target;
        target.restore_baseline_code();
        if target.is_in_optimization_queue() {
            target.clear_optimization_marker();
        }
        if job.info.osr {
            target.set_osr_in_optimization_queue(false);
        }
    }
    job.state = JobState::Disposed;
    tracing::trace!(
        job = %job.info.id,
        state = ?job.state,
        restore_function_code,
        "disposed compile job"
    );
}

/// Execution context of a worker thread running one dispatch task.
///
/// Created on the worker and dropped before the task finishes; it is never
/// shared with the owner thread.
pub struct WorkerContext {
    thread_id: ThreadId,
    thread_name: Option<String>,
    span: EnteredSpan,
}

impl WorkerContext {
    pub(crate) fn enter(dispatcher: u64) -> Self {
        let current = thread::current();
        let span = tracing::info_span!(
            "opt_worker",
            dispatcher,
            job = tracing::field::Empty
        )
        .entered();
        Self {
            thread_id: current.id(),
            thread_name: current.name().map(str::to_string),
            span,
        }
    }

    pub(crate) fn record_job(&self, id: JobId) {
        self.span.record("job", id.as_u64());
    }

    /// Thread running the task.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Name of the thread running the task, if it has one.
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }
}

/// Context handed to [`CompilePipeline::finalize`] on the owner thread.
#[derive(Debug, Clone, Copy)]
pub struct OwnerContext {
    thread_id: ThreadId,
    trace: bool,
}

impl OwnerContext {
    pub(crate) fn current(trace: bool) -> Self {
        Self {
            thread_id: thread::current().id(),
            trace,
        }
    }

    /// The owner thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether recompilation tracing is enabled.
    pub fn trace(&self) -> bool {
        self.trace
    }
}
