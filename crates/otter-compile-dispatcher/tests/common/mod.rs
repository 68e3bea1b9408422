//! Test collaborators for the dispatcher integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use otter_compile_dispatcher::{
    CodeKind, CompileJob, CompilePipeline, JobInfo, OptimizationTarget, OwnerContext,
    TaskRunner, WorkerContext, WorkerTask,
};
use parking_lot::Mutex;

/// A function whose code state is tracked for assertions.
pub struct TestFunction {
    name: String,
    code_kind: Mutex<CodeKind>,
    in_optimization_queue: AtomicBool,
    osr_in_optimization_queue: AtomicBool,
    reverts: AtomicUsize,
}

impl TestFunction {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_code(name, CodeKind::Interpreter)
    }

    pub fn with_code(name: &str, code_kind: CodeKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            code_kind: Mutex::new(code_kind),
            in_optimization_queue: AtomicBool::new(false),
            osr_in_optimization_queue: AtomicBool::new(false),
            reverts: AtomicUsize::new(0),
        })
    }

    pub fn install(&self, code_kind: CodeKind) {
        *self.code_kind.lock() = code_kind;
        self.in_optimization_queue.store(false, Ordering::SeqCst);
        self.osr_in_optimization_queue.store(false, Ordering::SeqCst);
    }

    pub fn reverts(&self) -> usize {
        self.reverts.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> bool {
        self.in_optimization_queue.load(Ordering::SeqCst)
    }

    pub fn osr_queued(&self) -> bool {
        self.osr_in_optimization_queue.load(Ordering::SeqCst)
    }
}

impl OptimizationTarget for TestFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn code_kind(&self) -> CodeKind {
        *self.code_kind.lock()
    }

    fn restore_baseline_code(&self) {
        *self.code_kind.lock() = CodeKind::Interpreter;
        self.reverts.fetch_add(1, Ordering::SeqCst);
    }

    fn is_in_optimization_queue(&self) -> bool {
        self.in_optimization_queue.load(Ordering::SeqCst)
    }

    fn clear_optimization_marker(&self) {
        self.in_optimization_queue.store(false, Ordering::SeqCst);
    }

    fn set_osr_in_optimization_queue(&self, pending: bool) {
        self.osr_in_optimization_queue.store(pending, Ordering::SeqCst);
    }
}

/// Outcome of the simulated background compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Succeeded,
    Failed,
}

/// Per-job payload. Dropping it bumps the shared drop counter, so tests can
/// check that every job is released exactly once.
pub struct TestUnit {
    pub label: String,
    pub function: Arc<TestFunction>,
    pub delay: Duration,
    pub fail: bool,
    pub panic: bool,
    pub started: Option<Sender<()>>,
    pub gate: Option<Receiver<()>>,
    drops: Arc<AtomicUsize>,
}

impl Drop for TestUnit {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct TestPipeline {
    pub installed: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
    pub worker_threads: Mutex<Vec<Option<String>>>,
    pub install_requests: AtomicUsize,
}

impl CompilePipeline for TestPipeline {
    type Unit = TestUnit;
    type Status = TestStatus;

    fn execute(&self, unit: &mut TestUnit, _info: &JobInfo, ctx: &mut WorkerContext) -> TestStatus {
        self.worker_threads
            .lock()
            .push(ctx.thread_name().map(str::to_string));
        if let Some(started) = unit.started.take() {
            let _ = started.send(());
        }
        if let Some(gate) = unit.gate.take() {
            let _ = gate.recv();
        }
        if !unit.delay.is_zero() {
            thread::sleep(unit.delay);
        }
        if unit.panic {
            panic!("pipeline failure for {}", unit.label);
        }
        self.completed.lock().push(unit.label.clone());
        if unit.fail {
            TestStatus::Failed
        } else {
            TestStatus::Succeeded
        }
    }

    fn finalize(&self, job: CompileJob<Self>, _ctx: &OwnerContext) {
        let status = *job.status().expect("finalized jobs have completed");
        let code_kind = job.code_kind();
        let unit = job.into_unit();
        match status {
            TestStatus::Succeeded => unit.function.install(code_kind),
            TestStatus::Failed => {
                unit.function.restore_baseline_code();
                unit.function.clear_optimization_marker();
            }
        }
        self.installed.lock().push(unit.label.clone());
    }

    fn request_install_code(&self) {
        self.install_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds jobs that share one drop counter.
#[derive(Default)]
pub struct JobFactory {
    drops: Arc<AtomicUsize>,
    created: AtomicUsize,
}

impl JobFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, label: &str, function: &Arc<TestFunction>) -> JobBuilder<'_> {
        JobBuilder {
            factory: self,
            label: label.to_string(),
            function: function.clone(),
            code_kind: CodeKind::TopTier,
            osr: false,
            delay: Duration::ZERO,
            fail: false,
            panic: false,
            started: None,
            gate: None,
        }
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

pub struct JobBuilder<'a> {
    factory: &'a JobFactory,
    label: String,
    function: Arc<TestFunction>,
    code_kind: CodeKind,
    osr: bool,
    delay: Duration,
    fail: bool,
    panic: bool,
    started: Option<Sender<()>>,
    gate: Option<Receiver<()>>,
}

impl JobBuilder<'_> {
    pub fn kind(mut self, code_kind: CodeKind) -> Self {
        self.code_kind = code_kind;
        self
    }

    pub fn osr(mut self) -> Self {
        self.osr = true;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    /// Signal `started` when execution begins, then wait for `gate`.
    pub fn gated(mut self, started: Sender<()>, gate: Receiver<()>) -> Self {
        self.started = Some(started);
        self.gate = Some(gate);
        self
    }

    /// Mark the function as queued (and OSR-queued) and build the job.
    pub fn build(self) -> CompileJob<TestPipeline> {
        self.function
            .in_optimization_queue
            .store(true, Ordering::SeqCst);
        if self.osr {
            self.function
                .osr_in_optimization_queue
                .store(true, Ordering::SeqCst);
        }
        self.factory.created.fetch_add(1, Ordering::SeqCst);

        let target: Arc<dyn OptimizationTarget> = self.function.clone();
        CompileJob::new(
            target,
            self.code_kind,
            self.osr,
            TestUnit {
                label: self.label,
                function: self.function,
                delay: self.delay,
                fail: self.fail,
                panic: self.panic,
                started: self.started,
                gate: self.gate,
                drops: self.factory.drops.clone(),
            },
        )
    }
}

/// Runner that holds posted tasks until the test decides what to do with them.
#[derive(Default)]
pub struct ManualRunner {
    tasks: Mutex<Vec<Box<dyn WorkerTask>>>,
}

impl ManualRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Run the oldest held task on the calling thread.
    pub fn run_next(&self) -> bool {
        let task = {
            let mut tasks = self.tasks.lock();
            if tasks.is_empty() {
                return false;
            }
            tasks.remove(0)
        };
        task.run();
        true
    }

    pub fn run_all(&self) {
        while self.run_next() {}
    }

    /// Take the oldest held task without running it.
    pub fn take_next(&self) -> Option<Box<dyn WorkerTask>> {
        let mut tasks = self.tasks.lock();
        if tasks.is_empty() {
            None
        } else {
            Some(tasks.remove(0))
        }
    }

    /// Drop the oldest held task unrun.
    pub fn discard_next(&self) -> bool {
        self.take_next().is_some()
    }

    /// Drop every held task unrun, as a pool shutting down would.
    pub fn discard_all(&self) {
        self.tasks.lock().clear();
    }
}

impl TaskRunner for ManualRunner {
    fn post_task(&self, task: Box<dyn WorkerTask>) {
        self.tasks.lock().push(task);
    }
}

/// Poll `condition` for up to two seconds.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
