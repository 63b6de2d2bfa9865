//! Task definitions
//!
//! A task is a unit of simulated work: an objective string, a strategy
//! kind, a priority, and an optional dependency set. Tasks are created by
//! objective decomposition, mutated by the scheduler (assignment) and the
//! executor (status), and dropped once their result is recorded.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::coordination::CoordinationModeKind;

/// Unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{}", self.0)
    }
}

/// Strategy kind describing the nature of the work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Auto,
    Research,
    Development,
    Analysis,
    Testing,
    Optimization,
    Maintenance,
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::Auto
    }
}

impl StrategyKind {
    /// Relative complexity weight, used by hybrid coordination to estimate
    /// task complexity.
    pub fn complexity_weight(&self) -> f64 {
        match self {
            Self::Auto => 0.5,
            Self::Research => 0.8,
            Self::Development => 1.0,
            Self::Analysis => 0.7,
            Self::Testing => 0.6,
            Self::Optimization => 0.9,
            Self::Maintenance => 0.4,
        }
    }

    /// Workload hint consumed by the executor.
    pub fn workload_class(&self) -> WorkloadClass {
        match self {
            Self::Research | Self::Analysis => WorkloadClass::IoBound,
            Self::Development | Self::Testing | Self::Optimization => WorkloadClass::CpuBound,
            Self::Auto | Self::Maintenance => WorkloadClass::Lightweight,
        }
    }
}

/// Workload classification hint
///
/// CPU-bound tasks are gated by a core-count semaphore in the executor to
/// avoid oversubscription; I/O-bound and lightweight tasks are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadClass {
    IoBound,
    CpuBound,
    Lightweight,
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl TaskStatus {
    /// Terminal states are final; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }
}

/// A unit of simulated work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,

    /// What the task is meant to accomplish
    pub objective: String,

    /// Nature of the work
    pub strategy: StrategyKind,

    /// Coordination topology requested for this task
    pub coordination_mode: CoordinationModeKind,

    /// Free-form parameters passed through to the strategy executor
    pub parameters: HashMap<String, serde_json::Value>,

    /// Per-task execution timeout
    #[serde(with = "crate::model::result::duration_secs")]
    pub timeout: Duration,

    /// Maximum retry attempts on failure
    pub max_retries: u32,

    /// Priority (higher = more urgent)
    pub priority: u8,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Task IDs that must complete before this task may start
    pub dependencies: HashSet<TaskId>,

    /// Capability tags an agent should carry to run this task well.
    /// Empty means any agent matches with score 1.0.
    pub required_capabilities: HashSet<String>,

    /// Agents assigned by the scheduler
    pub assigned_agents: Vec<crate::model::agent::AgentId>,

    /// Creation timestamp (FIFO tie-break input)
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending task with defaults
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            objective: objective.into(),
            strategy: StrategyKind::Auto,
            coordination_mode: CoordinationModeKind::Centralized,
            parameters: HashMap::new(),
            timeout: Duration::from_secs(300),
            max_retries: 0,
            priority: 0,
            status: TaskStatus::Pending,
            dependencies: HashSet::new(),
            required_capabilities: HashSet::new(),
            assigned_agents: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_dependency(mut self, dep: TaskId) -> Self {
        self.dependencies.insert(dep);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.insert(capability.into());
        self
    }

    pub fn with_coordination(mut self, mode: CoordinationModeKind) -> Self {
        self.coordination_mode = mode;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Capability match score against an agent's capability set.
    ///
    /// 1.0 when the task has no specific requirement, otherwise the
    /// fraction of required capabilities the agent carries.
    pub fn capability_score(&self, agent_capabilities: &HashSet<String>) -> f64 {
        if self.required_capabilities.is_empty() {
            return 1.0;
        }
        let matched = self
            .required_capabilities
            .intersection(agent_capabilities)
            .count();
        matched as f64 / self.required_capabilities.len() as f64
    }
}
