//! Minimal collaborators shared by the inline unit tests.

use std::sync::Arc;

use crate::job::{
    CodeKind, CompileJob, CompilePipeline, JobInfo, OptimizationTarget, OwnerContext,
    WorkerContext,
};

pub(crate) struct NullTarget;

impl OptimizationTarget for NullTarget {
    fn name(&self) -> &str {
        "null"
    }

    fn code_kind(&self) -> CodeKind {
        CodeKind::Interpreter
    }

    fn restore_baseline_code(&self) {}

    fn is_in_optimization_queue(&self) -> bool {
        false
    }

    fn clear_optimization_marker(&self) {}

    fn set_osr_in_optimization_queue(&self, _pending: bool) {}
}

/// Pipeline whose units are plain labels; execution doubles the label.
pub(crate) struct LabelPipeline;

impl CompilePipeline for LabelPipeline {
    type Unit = u32;
    type Status = u32;

    fn execute(&self, unit: &mut u32, _info: &JobInfo, _ctx: &mut WorkerContext) -> u32 {
        *unit * 2
    }

    fn finalize(&self, _job: CompileJob<Self>, _ctx: &OwnerContext) {}
}

pub(crate) fn job(label: u32) -> CompileJob<LabelPipeline> {
    CompileJob::new(Arc::new(NullTarget), CodeKind::TopTier, false, label)
}
