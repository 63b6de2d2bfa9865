//! Coordination-mode strategies
//!
//! Five interchangeable topologies decide how tasks map onto agents and
//! what simulated overhead they incur:
//!
//! - **Centralized**: one coordinator assigns every task sequentially
//! - **Distributed**: 2-3 coordinators auction their partitions in parallel
//! - **Hierarchical**: a 3-level tree (root, managers, workers)
//! - **Mesh**: full peer graph with per-task negotiation among idle agents
//! - **Hybrid**: per-task dispatch to one of the other four
//!
//! All modes record a history entry per invocation and expose an
//! average-overhead and efficiency ratio in their metrics.

pub mod centralized;
pub mod distributed;
pub mod hierarchical;
pub mod hybrid;
pub mod mesh;
pub mod overhead;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::executor::ParallelExecutor;
use crate::model::agent::Agent;
use crate::model::result::TaskResult;
use crate::model::task::{Task, TaskId};
use crate::utils::errors::{EngineError, Result};

pub use centralized::CentralizedMode;
pub use distributed::DistributedMode;
pub use hierarchical::HierarchicalMode;
pub use hybrid::HybridMode;
pub use mesh::MeshMode;
pub use overhead::{CostModel, FixedCost, RandomizedCost, ZeroCost};

/// Coordination topology selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationModeKind {
    Centralized,
    Distributed,
    Hierarchical,
    Mesh,
    Hybrid,
}

impl CoordinationModeKind {
    pub fn all() -> &'static [CoordinationModeKind] {
        &[
            Self::Centralized,
            Self::Distributed,
            Self::Hierarchical,
            Self::Mesh,
            Self::Hybrid,
        ]
    }
}

impl Default for CoordinationModeKind {
    fn default() -> Self {
        Self::Centralized
    }
}

/// Shared hooks every mode needs: the executor that runs tasks and the
/// injectable cost model supplying simulated overhead.
#[derive(Clone)]
pub struct CoordinationContext {
    pub executor: Arc<ParallelExecutor>,
    pub cost_model: Arc<dyn CostModel>,
}

/// One history entry per `coordinate` invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationHistoryEntry {
    pub agent_count: usize,
    pub task_count: usize,
    pub result_count: usize,
    pub success_count: usize,
    pub overhead_secs: f64,
    pub at: DateTime<Utc>,
}

/// Read-only metrics snapshot for one mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub invocations: usize,
    pub total_tasks: usize,
    pub successful_tasks: usize,
    /// successful / total
    pub efficiency: f64,
    /// Mean simulated overhead per invocation, seconds
    pub average_overhead_secs: f64,
    /// Topology-specific extras (e.g. mesh connection strength)
    pub extras: HashMap<String, f64>,
}

/// Shared history bookkeeping used by every mode
#[derive(Default)]
pub(crate) struct History {
    entries: Mutex<Vec<CoordinationHistoryEntry>>,
    extras: Mutex<HashMap<String, f64>>,
}

impl History {
    pub fn record(
        &self,
        agent_count: usize,
        task_count: usize,
        results: &[TaskResult],
        overhead: Duration,
    ) {
        let success_count = results.iter().filter(|r| r.status.is_success()).count();
        self.entries.lock().push(CoordinationHistoryEntry {
            agent_count,
            task_count,
            result_count: results.len(),
            success_count,
            overhead_secs: overhead.as_secs_f64(),
            at: Utc::now(),
        });
    }

    pub fn set_extra(&self, key: &str, value: f64) {
        self.extras.lock().insert(key.to_string(), value);
    }

    pub fn metrics(&self) -> CoordinationMetrics {
        let entries = self.entries.lock();
        let total_tasks: usize = entries.iter().map(|e| e.task_count).sum();
        let successful_tasks: usize = entries.iter().map(|e| e.success_count).sum();
        let average_overhead_secs = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.overhead_secs).sum::<f64>() / entries.len() as f64
        };

        CoordinationMetrics {
            invocations: entries.len(),
            total_tasks,
            successful_tasks,
            efficiency: if total_tasks > 0 {
                successful_tasks as f64 / total_tasks as f64
            } else {
                0.0
            },
            average_overhead_secs,
            extras: self.extras.lock().clone(),
        }
    }
}

/// Closed set of topology strategies
pub enum CoordinationMode {
    Centralized(CentralizedMode),
    Distributed(DistributedMode),
    Hierarchical(HierarchicalMode),
    Mesh(MeshMode),
    Hybrid(HybridMode),
}

impl CoordinationMode {
    /// Build the mode for a topology kind.
    pub fn new(kind: CoordinationModeKind, ctx: CoordinationContext) -> Self {
        match kind {
            CoordinationModeKind::Centralized => Self::Centralized(CentralizedMode::new(ctx)),
            CoordinationModeKind::Distributed => Self::Distributed(DistributedMode::new(ctx)),
            CoordinationModeKind::Hierarchical => Self::Hierarchical(HierarchicalMode::new(ctx)),
            CoordinationModeKind::Mesh => Self::Mesh(MeshMode::new(ctx)),
            CoordinationModeKind::Hybrid => Self::Hybrid(HybridMode::new(ctx)),
        }
    }

    pub fn kind(&self) -> CoordinationModeKind {
        match self {
            Self::Centralized(_) => CoordinationModeKind::Centralized,
            Self::Distributed(_) => CoordinationModeKind::Distributed,
            Self::Hierarchical(_) => CoordinationModeKind::Hierarchical,
            Self::Mesh(_) => CoordinationModeKind::Mesh,
            Self::Hybrid(_) => CoordinationModeKind::Hybrid,
        }
    }

    /// Distribute `tasks` over `agents` per the topology's policy and
    /// run them to completion. Partitions execute fully concurrently;
    /// no cross-partition ordering is guaranteed.
    pub async fn coordinate(
        &self,
        agents: &[Agent],
        tasks: Vec<Task>,
    ) -> Result<Vec<TaskResult>> {
        if agents.is_empty() {
            return Err(EngineError::NoAgentsAvailable(
                "coordination requires at least one agent".into(),
            ));
        }
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            Self::Centralized(mode) => mode.coordinate(agents, tasks).await,
            Self::Distributed(mode) => mode.coordinate(agents, tasks).await,
            Self::Hierarchical(mode) => mode.coordinate(agents, tasks).await,
            Self::Mesh(mode) => mode.coordinate(agents, tasks).await,
            Self::Hybrid(mode) => mode.coordinate(agents, tasks).await,
        }
    }

    /// Metrics accumulated across invocations.
    pub fn metrics(&self) -> CoordinationMetrics {
        match self {
            Self::Centralized(mode) => mode.metrics(),
            Self::Distributed(mode) => mode.metrics(),
            Self::Hierarchical(mode) => mode.metrics(),
            Self::Mesh(mode) => mode.metrics(),
            Self::Hybrid(mode) => mode.metrics(),
        }
    }
}

/// The scheduler's placement for a task, honored when that agent is in
/// scope for the caller's topology role. Returns None for unplaced
/// tasks and for placements outside the scope, letting the mode fall
/// back to its own selection.
pub(crate) fn planned_agent<'a>(task: &Task, scope: &[&'a Agent]) -> Option<&'a Agent> {
    let planned = *task.assigned_agents.first()?;
    scope.iter().copied().find(|a| a.id == planned)
}

/// Agents ranked by historical success rate, best first.
pub(crate) fn rank_by_success(agents: &[Agent]) -> Vec<&Agent> {
    let mut ranked: Vec<&Agent> = agents.iter().collect();
    ranked.sort_by(|a, b| {
        b.perf
            .success_rate()
            .partial_cmp(&a.perf.success_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Submit an assigned task and remember the overhead that preceded it.
pub(crate) struct PendingResult {
    pub task_id: TaskId,
    pub timeout: Duration,
    pub overhead: Duration,
    pub latency: Duration,
}

/// Await every pending task and stamp the simulated overhead/latency
/// into the returned results.
pub(crate) async fn collect_results(
    executor: &ParallelExecutor,
    pending: Vec<PendingResult>,
) -> Vec<TaskResult> {
    /// Slack on top of the task's own timeout for queue wait and gating.
    const GRACE: Duration = Duration::from_secs(30);

    let mut results = Vec::with_capacity(pending.len());
    for entry in pending {
        let budget = entry.timeout + entry.overhead + GRACE;
        let mut result = match executor.get_result(entry.task_id, budget).await {
            Some(result) => result,
            // The executor enforces per-task timeouts, so this only
            // triggers under extreme queue backlog.
            None => TaskResult::timeout(entry.task_id, None, budget),
        };
        result.performance.coordination_overhead = entry.overhead;
        result.performance.communication_latency = entry.latency;
        results.push(result);
    }
    results
}
