//! Execution results
//!
//! A `TaskResult` is immutable once created: the executor constructs it
//! after a task reaches a terminal state and appends it to the owning
//! benchmark's result list. Performance and resource snapshots are plain
//! numeric values owned by exactly one result.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::agent::AgentId;
use crate::model::task::TaskId;

/// Unique result identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(pub Ulid);

impl ResultId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result_{}", self.0)
    }
}

/// Terminal outcome of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Failure,
    Partial,
    Error,
    Timeout,
    Cancelled,
}

impl ResultStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Partial)
    }
}

/// Timing metrics for one execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Wall-clock execution time
    #[serde(with = "duration_secs")]
    pub execution_time: Duration,

    /// Time spent queued before a worker picked the task up
    #[serde(with = "duration_secs")]
    pub queue_time: Duration,

    /// Tasks per second observed at completion time
    pub throughput: f64,

    /// Retry attempts consumed
    pub retry_count: u32,

    /// Simulated coordination overhead applied by the coordination mode
    #[serde(with = "duration_secs")]
    pub coordination_overhead: Duration,

    /// Simulated communication latency (mesh/distributed topologies)
    #[serde(with = "duration_secs")]
    pub communication_latency: Duration,
}

/// Resource snapshot for one execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPU usage percentage at completion
    pub cpu_percent: f64,

    /// Memory in MB at completion
    pub memory_mb: f64,

    /// Peak memory in MB observed during execution
    pub peak_memory_mb: f64,

    /// Bytes read during execution
    pub io_read_bytes: u64,

    /// Bytes written during execution
    pub io_write_bytes: u64,
}

/// Immutable record of one task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Unique result ID
    pub id: ResultId,

    /// Task this result belongs to
    pub task_id: TaskId,

    /// Agent that executed the task, when one was assigned
    pub agent_id: Option<AgentId>,

    /// Terminal outcome
    pub status: ResultStatus,

    /// Opaque payload produced by the strategy executor
    pub output: serde_json::Value,

    /// Error messages, when the execution failed
    pub errors: Vec<String>,

    /// Non-fatal warnings
    pub warnings: Vec<String>,

    /// Timing metrics
    pub performance: PerformanceMetrics,

    /// Resource snapshot
    pub resources: ResourceUsage,

    /// Execution start
    pub started_at: DateTime<Utc>,

    /// Execution end
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// Build a result for a successful execution
    pub fn success(task_id: TaskId, agent_id: Option<AgentId>, output: serde_json::Value) -> Self {
        Self::with_status(task_id, agent_id, ResultStatus::Success, output)
    }

    /// Build a result for a failed execution carrying the error message
    pub fn failure(task_id: TaskId, agent_id: Option<AgentId>, error: impl Into<String>) -> Self {
        let mut result = Self::with_status(
            task_id,
            agent_id,
            ResultStatus::Failure,
            serde_json::Value::Null,
        );
        result.errors.push(error.into());
        result
    }

    /// Build a result for a timed-out execution
    pub fn timeout(task_id: TaskId, agent_id: Option<AgentId>, budget: Duration) -> Self {
        let mut result = Self::with_status(
            task_id,
            agent_id,
            ResultStatus::Timeout,
            serde_json::Value::Null,
        );
        result
            .errors
            .push(format!("execution exceeded timeout of {:.3}s", budget.as_secs_f64()));
        result
    }

    /// Build a result for a cancelled task
    pub fn cancelled(task_id: TaskId, agent_id: Option<AgentId>) -> Self {
        Self::with_status(
            task_id,
            agent_id,
            ResultStatus::Cancelled,
            serde_json::Value::Null,
        )
    }

    fn with_status(
        task_id: TaskId,
        agent_id: Option<AgentId>,
        status: ResultStatus,
        output: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ResultId::new(),
            task_id,
            agent_id,
            status,
            output,
            errors: Vec::new(),
            warnings: Vec::new(),
            performance: PerformanceMetrics::default(),
            resources: ResourceUsage::default(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn with_performance(mut self, performance: PerformanceMetrics) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_resources(mut self, resources: ResourceUsage) -> Self {
        self.resources = resources;
        self
    }
}

/// Serialize `Duration` as fractional seconds so metrics snapshots stay
/// readable for the reporting layer.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_constructors() {
        let task_id = TaskId::new();

        let ok = TaskResult::success(task_id, None, serde_json::json!({"out": 1}));
        assert_eq!(ok.status, ResultStatus::Success);
        assert!(ok.errors.is_empty());

        let failed = TaskResult::failure(task_id, None, "boom");
        assert_eq!(failed.status, ResultStatus::Failure);
        assert_eq!(failed.errors, vec!["boom".to_string()]);

        let timed_out = TaskResult::timeout(task_id, None, Duration::from_millis(10));
        assert_eq!(timed_out.status, ResultStatus::Timeout);
    }

    #[test]
    fn test_serde_round_trip_preserves_key_fields() {
        let task_id = TaskId::new();
        let mut result = TaskResult::success(task_id, Some(AgentId::new()), serde_json::json!("ok"));
        result.performance.execution_time = Duration::from_secs_f64(1.234567);

        let json = serde_json::to_string(&result).unwrap();
        let back: TaskResult = serde_json::from_str(&json).unwrap();

        assert_eq!(back.task_id, result.task_id);
        assert_eq!(back.status, result.status);
        let delta = (back.performance.execution_time.as_secs_f64()
            - result.performance.execution_time.as_secs_f64())
        .abs();
        assert!(delta < 1e-9);
    }
}
