//! # Otter Compile Dispatcher
//!
//! Background scheduling for the optimizing tier:
//! - bounded queue of jobs waiting for a worker
//! - one pool task per queued job, tracked by an in-flight barrier
//! - completed jobs held until the owning thread installs or discards them
//!
//! The runtime thread that owns an [`OptimizingCompileDispatcher`] decides when
//! results are installed. Workers never touch the live system; they only run
//! the pipeline's background phase and publish the job back.

#![warn(clippy::all)]
#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod input_queue;
mod job;
mod output_queue;
mod pool;
mod ref_count;
mod stats;
mod task;

#[cfg(test)]
mod test_support;

pub use config::{DEFAULT_QUEUE_CAPACITY, DispatcherConfig, is_concurrent_recompilation_enabled};
pub use dispatcher::{BlockingBehavior, OptimizingCompileDispatcher};
pub use error::{DispatchError, DispatchResult};
pub use job::{
    CodeKind, CompileJob, CompilePipeline, JobId, JobInfo, JobState, OptimizationTarget,
    OwnerContext, WorkerContext,
};
pub use pool::WorkerPool;
pub use ref_count::{InFlightTask, RefCountBarrier};
pub use stats::DispatcherStatsSnapshot;
pub use task::{TaskRunner, WorkerTask};
