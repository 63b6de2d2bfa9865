//! Engine error types
//!
//! Per-task failures are never surfaced through this type: they are
//! converted into `TaskResult` records by the executor. `EngineError`
//! covers batch-level programming errors (invalid configuration, empty
//! agent pool at benchmark start) and submission rejections the caller
//! is expected to handle (queue full, shutdown).

use thiserror::Error;

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error taxonomy
#[derive(Debug, Error)]
pub enum EngineError {
    /// Task submission rejected because the bounded priority queue is at
    /// capacity. Callers should back off and retry.
    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The benchmark was started with an empty agent pool.
    #[error("no agents available: {0}")]
    NoAgentsAvailable(String),

    /// Task dependencies form a cycle and cannot be leveled.
    #[error("dependency cycle detected involving {count} tasks")]
    DependencyCycle { count: usize },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure loading configuration from file or environment.
    #[error("configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// The executor is shutting down and no longer accepts work.
    #[error("executor is shut down")]
    Shutdown,

    /// Wrapped failure from the pluggable task strategy. Only used
    /// internally; workers convert this into a failed `TaskResult`.
    #[error("task execution failed: {0}")]
    ExecutionFailed(String),
}
