//! Pluggable task strategies
//!
//! The executor treats the actual unit of work as a black box: a
//! `TaskStrategy` receives the task and returns an output payload or an
//! error after some duration. The surrounding application supplies the
//! real strategy; the simulated strategies here back benchmarks and
//! tests.

use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use serde_json::json;

use crate::model::task::Task;
use crate::utils::errors::{EngineError, Result};

/// Black-box execution seam
pub trait TaskStrategy: Send + Sync {
    /// Perform the task's unit of work. Errors are converted into failed
    /// results by the worker; they never escape the executor.
    fn execute(&self, task: Task) -> BoxFuture<'static, Result<serde_json::Value>>;
}

/// Strategy that sleeps a fixed duration and succeeds. The workhorse for
/// deterministic tests and timeout scenarios.
pub struct SleepStrategy {
    pub duration: Duration,
}

impl SleepStrategy {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl TaskStrategy for SleepStrategy {
    fn execute(&self, task: Task) -> BoxFuture<'static, Result<serde_json::Value>> {
        let duration = self.duration;
        Box::pin(async move {
            tokio::time::sleep(duration).await;
            Ok(json!({ "task": task.id.to_string(), "slept_ms": duration.as_millis() as u64 }))
        })
    }
}

/// Strategy that always fails with a fixed message. Drives retry and
/// failure-propagation tests.
pub struct FailingStrategy {
    pub message: String,
}

impl FailingStrategy {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TaskStrategy for FailingStrategy {
    fn execute(&self, _task: Task) -> BoxFuture<'static, Result<serde_json::Value>> {
        let message = self.message.clone();
        Box::pin(async move { Err(EngineError::ExecutionFailed(message)) })
    }
}

/// Simulated workload: duration scales with objective length and the
/// strategy kind's complexity weight, plus bounded random jitter.
pub struct SimulatedStrategy {
    /// Base duration per task
    pub base: Duration,

    /// Maximum random jitter added on top
    pub jitter: Duration,
}

impl Default for SimulatedStrategy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(20),
            jitter: Duration::from_millis(30),
        }
    }
}

impl TaskStrategy for SimulatedStrategy {
    fn execute(&self, task: Task) -> BoxFuture<'static, Result<serde_json::Value>> {
        let complexity = task.strategy.complexity_weight()
            * (1.0 + (task.objective.len() as f64 / 200.0).min(2.0));
        let jitter_ms = if self.jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter.as_millis() as u64)
        };
        let duration = self.base.mul_f64(complexity) + Duration::from_millis(jitter_ms);

        Box::pin(async move {
            tokio::time::sleep(duration).await;
            Ok(json!({
                "task": task.id.to_string(),
                "objective": task.objective,
                "simulated_ms": duration.as_millis() as u64,
            }))
        })
    }
}

/// Adapter turning a closure into a strategy.
pub struct FnStrategy<F>(pub F);

impl<F> TaskStrategy for FnStrategy<F>
where
    F: Fn(Task) -> BoxFuture<'static, Result<serde_json::Value>> + Send + Sync,
{
    fn execute(&self, task: Task) -> BoxFuture<'static, Result<serde_json::Value>> {
        (self.0)(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_strategy_succeeds() {
        let strategy = SleepStrategy::new(Duration::from_millis(5));
        let output = strategy.execute(Task::new("nap")).await.unwrap();
        assert!(output["slept_ms"].as_u64().unwrap() >= 5);
    }

    #[tokio::test]
    async fn test_failing_strategy_reports_message() {
        let strategy = FailingStrategy::new("simulated fault");
        let err = strategy.execute(Task::new("doomed")).await.unwrap_err();
        assert!(err.to_string().contains("simulated fault"));
    }

    #[tokio::test]
    async fn test_fn_strategy_adapter() {
        let strategy = FnStrategy(|task: Task| -> BoxFuture<'static, Result<serde_json::Value>> {
            Box::pin(async move { Ok(json!({ "echo": task.objective })) })
        });
        let output = strategy.execute(Task::new("hello")).await.unwrap();
        assert_eq!(output["echo"], "hello");
    }
}
