//! Error types for otter-compile-dispatcher

use thiserror::Error;

/// Errors raised while configuring or starting the dispatcher.
///
/// Runtime misuse such as queueing into a full input queue is a caller bug and
/// panics instead; pipeline failures are carried in the pipeline's own status.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidConfig {
        /// Environment variable name.
        var: &'static str,
        /// Raw value that failed to parse.
        value: String,
    },

    /// The input queue must hold at least one job.
    #[error("input queue capacity must be non-zero")]
    ZeroCapacity,

    /// A worker pool needs at least one thread.
    #[error("worker pool size must be non-zero")]
    ZeroWorkers,

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Result type alias for dispatcher setup.
pub type DispatchResult<T> = Result<T, DispatchError>;
