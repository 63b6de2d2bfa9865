//! Benchmark aggregate
//!
//! A benchmark owns one configuration, the tasks decomposed from its
//! objective, the agents it ran on, and the results collected back from
//! the executor. `BenchmarkMetrics` are recomputed incrementally as
//! results arrive rather than in one pass at the end.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordination::CoordinationModeKind;
use crate::model::agent::Agent;
use crate::model::result::TaskResult;
use crate::model::task::{StrategyKind, Task};
use crate::scheduler::SchedulingAlgorithm;
use crate::utils::errors::{EngineError, Result};

/// Immutable configuration snapshot for one benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Strategy kind applied to decomposed tasks
    pub strategy: StrategyKind,

    /// Coordination topology
    pub coordination_mode: CoordinationModeKind,

    /// Algorithm for the placement pass that runs before coordination
    pub scheduling_algorithm: SchedulingAlgorithm,

    /// Agent pool ceiling for this benchmark
    pub max_agents: usize,

    /// Maximum tasks decomposed from the objective
    pub max_tasks: usize,

    /// Per-task timeout
    #[serde(with = "crate::model::result::duration_secs")]
    pub task_timeout: Duration,

    /// Executor queue capacity
    pub queue_capacity: usize,

    /// Maximum CPU percentage before resource gating kicks in
    pub max_cpu_percent: f64,

    /// Maximum memory in MB before resource gating kicks in
    pub max_memory_mb: u64,

    /// Abort remaining submissions on the first failed task
    pub fail_fast: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            coordination_mode: CoordinationModeKind::Centralized,
            scheduling_algorithm: SchedulingAlgorithm::Dynamic,
            max_agents: 8,
            max_tasks: 100,
            task_timeout: Duration::from_secs(300),
            queue_capacity: 1000,
            max_cpu_percent: 90.0,
            max_memory_mb: 8192,
            fail_fast: false,
        }
    }
}

impl BenchmarkConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_agents == 0 {
            return Err(EngineError::InvalidConfig("max_agents cannot be 0".into()));
        }
        if self.max_tasks == 0 {
            return Err(EngineError::InvalidConfig("max_tasks cannot be 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue_capacity cannot be 0".into(),
            ));
        }
        if self.task_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "task_timeout cannot be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Derived metrics for one benchmark, updated incrementally
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// Total tasks in the benchmark
    pub total_tasks: usize,

    /// Tasks that finished successfully
    pub completed_tasks: usize,

    /// Tasks that failed, timed out, or were cancelled
    pub failed_tasks: usize,

    /// completed / total, once total > 0
    pub success_rate: f64,

    /// Mean wall-clock execution time across recorded results, seconds
    pub average_execution_secs: f64,

    /// Total wall time of the benchmark, seconds
    pub total_wall_secs: f64,

    /// Peak memory observed across results, MB
    pub peak_memory_mb: f64,

    /// Mean simulated coordination overhead, seconds
    pub average_coordination_overhead_secs: f64,
}

/// One benchmark run: config, tasks, agents, results, derived metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    /// Objective the benchmark decomposes into tasks
    pub objective: String,

    /// Configuration snapshot
    pub config: BenchmarkConfig,

    /// Decomposed tasks
    pub tasks: Vec<Task>,

    /// Agents that participated
    pub agents: Vec<Agent>,

    /// Results collected so far
    pub results: Vec<TaskResult>,

    /// Derived metrics
    pub metrics: BenchmarkMetrics,

    /// Benchmark start
    pub started_at: DateTime<Utc>,

    /// Benchmark end, once finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl Benchmark {
    pub fn new(objective: impl Into<String>, config: BenchmarkConfig) -> Self {
        Self {
            objective: objective.into(),
            config,
            tasks: Vec::new(),
            agents: Vec::new(),
            results: Vec::new(),
            metrics: BenchmarkMetrics::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Register the decomposed tasks.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.metrics.total_tasks = tasks.len();
        self.tasks = tasks;
    }

    /// Append one result and fold it into the derived metrics.
    ///
    /// Invariant: `completed + failed <= total` holds because at most one
    /// result is recorded per task.
    pub fn record_result(&mut self, result: TaskResult) {
        if result.status.is_success() {
            self.metrics.completed_tasks += 1;
        } else {
            self.metrics.failed_tasks += 1;
        }

        if self.metrics.total_tasks > 0 {
            self.metrics.success_rate =
                self.metrics.completed_tasks as f64 / self.metrics.total_tasks as f64;
        }

        let recorded = self.results.len() as f64;
        let exec = result.performance.execution_time.as_secs_f64();
        self.metrics.average_execution_secs =
            (self.metrics.average_execution_secs * recorded + exec) / (recorded + 1.0);

        let overhead = result.performance.coordination_overhead.as_secs_f64();
        self.metrics.average_coordination_overhead_secs =
            (self.metrics.average_coordination_overhead_secs * recorded + overhead)
                / (recorded + 1.0);

        if result.resources.peak_memory_mb > self.metrics.peak_memory_mb {
            self.metrics.peak_memory_mb = result.resources.peak_memory_mb;
        }

        self.results.push(result);
    }

    /// Mark the benchmark finished and seal total wall time.
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.metrics.total_wall_secs = (now - self.started_at)
            .to_std()
            .unwrap_or_default()
            .as_secs_f64();
        self.finished_at = Some(now);
    }

    /// A benchmark is done once every task has a recorded result; partial
    /// failure is the normal case.
    pub fn is_done(&self) -> bool {
        self.metrics.completed_tasks + self.metrics.failed_tasks >= self.metrics.total_tasks
            && self.metrics.total_tasks > 0
    }

    /// The worst offending results (failures, slowest first), for the
    /// user-visible summary.
    pub fn worst_offenders(&self, limit: usize) -> Vec<&TaskResult> {
        let mut failures: Vec<&TaskResult> = self
            .results
            .iter()
            .filter(|r| !r.status.is_success())
            .collect();
        failures.sort_by(|a, b| {
            b.performance
                .execution_time
                .cmp(&a.performance.execution_time)
        });
        failures.truncate(limit);
        failures
    }
}
