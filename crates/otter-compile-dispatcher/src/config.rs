//! Dispatcher configuration.
//!
//! The dispatcher exposes only two tuning knobs: the fixed input queue
//! capacity and an artificial per-task delay used to make queueing order
//! observable in tests. Both can be overridden from the environment.

use std::time::Duration;

use crate::error::{DispatchError, DispatchResult};

/// Default input queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

const ENV_QUEUE_LENGTH: &str = "OTTER_OPT_QUEUE_LENGTH";
const ENV_RECOMPILATION_DELAY_MS: &str = "OTTER_OPT_RECOMPILATION_DELAY_MS";
const ENV_FINALIZE: &str = "OTTER_OPT_FINALIZE";
const ENV_TRACE: &str = "OTTER_TRACE_OPT_RECOMPILATION";
const ENV_CONCURRENT: &str = "OTTER_CONCURRENT_RECOMPILATION";

/// Configuration for an [`OptimizingCompileDispatcher`](crate::OptimizingCompileDispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum number of jobs waiting to be picked up by a worker.
    /// Default: 8
    pub queue_capacity: usize,

    /// Sleep applied by every worker task before it pulls a job.
    /// Default: zero
    pub recompilation_delay: Duration,

    /// Whether workers raise the install-requested hint after publishing.
    /// Default: true
    pub finalize: bool,

    /// Log flushes and stale drops at `info` instead of `debug`.
    /// Default: false
    pub trace: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            recompilation_delay: Duration::ZERO,
            finalize: true,
            trace: false,
        }
    }
}

impl DispatcherConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the artificial delay applied before each worker pulls a job.
    pub fn with_recompilation_delay(mut self, delay: Duration) -> Self {
        self.recompilation_delay = delay;
        self
    }

    /// Enable or disable the install-requested hint.
    pub fn with_finalize(mut self, finalize: bool) -> Self {
        self.finalize = finalize;
        self
    }

    /// Enable or disable verbose recompilation tracing.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Check that the config can back a dispatcher.
    pub fn validate(&self) -> DispatchResult<()> {
        if self.queue_capacity == 0 {
            return Err(DispatchError::ZeroCapacity);
        }
        Ok(())
    }

    /// Build a config from defaults overridden by `OTTER_OPT_*` variables.
    ///
    /// - `OTTER_OPT_QUEUE_LENGTH=<usize>`
    /// - `OTTER_OPT_RECOMPILATION_DELAY_MS=<u64>`
    /// - `OTTER_OPT_FINALIZE=<bool>`
    /// - `OTTER_TRACE_OPT_RECOMPILATION=<bool>`
    pub fn from_env() -> DispatchResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DispatchResult<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_QUEUE_LENGTH) {
            config.queue_capacity = parse_number(ENV_QUEUE_LENGTH, &value)?;
        }
        if let Some(value) = lookup(ENV_RECOMPILATION_DELAY_MS) {
            let millis: u64 = parse_number(ENV_RECOMPILATION_DELAY_MS, &value)?;
            config.recompilation_delay = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(ENV_FINALIZE) {
            config.finalize = parse_env_truthy(&value);
        }
        if let Some(value) = lookup(ENV_TRACE) {
            config.trace = parse_env_truthy(&value);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Check whether background recompilation is enabled.
///
/// Enabled by default. Set `OTTER_CONCURRENT_RECOMPILATION=0` to make the
/// runtime compile on its own thread instead of creating a dispatcher.
pub fn is_concurrent_recompilation_enabled() -> bool {
    concurrent_recompilation_from_lookup(|var| std::env::var(var).ok())
}

fn concurrent_recompilation_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup(ENV_CONCURRENT).is_none_or(|v| parse_env_truthy(&v))
}

fn parse_env_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0")
        && !value.trim().eq_ignore_ascii_case("false")
        && !value.trim().eq_ignore_ascii_case("off")
        && !value.trim().eq_ignore_ascii_case("no")
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> DispatchResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| DispatchError::InvalidConfig {
            var,
            value: value.to_string(),
        })
}
