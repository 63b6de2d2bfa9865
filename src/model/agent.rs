//! Agent definitions
//!
//! Agents are simulated workers. Each carries a capability set derived
//! from its kind and a rolling performance history the scheduler scores
//! against. Agent `status`/`current_task` are mutated only by the
//! scheduler (on assignment) and the executor (on release); the shared
//! map keeps those mutations serialized per entry.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::task::TaskId;

/// Unique agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Ulid);

impl AgentId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{}", self.0)
    }
}

/// Shared, concurrently accessible agent registry
pub type SharedAgents = Arc<DashMap<AgentId, Agent>>;

/// Agent specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Coordinator,
    Researcher,
    Developer,
    Analyzer,
    Reviewer,
    Tester,
    Documenter,
    Monitor,
    Specialist,
}

impl AgentKind {
    /// All kinds, in default pool-composition order
    pub fn all() -> &'static [AgentKind] {
        &[
            Self::Coordinator,
            Self::Researcher,
            Self::Developer,
            Self::Analyzer,
            Self::Reviewer,
            Self::Tester,
            Self::Documenter,
            Self::Monitor,
            Self::Specialist,
        ]
    }

    /// Default capability tags for this kind
    pub fn default_capabilities(&self) -> HashSet<String> {
        let tags: &[&str] = match self {
            Self::Coordinator => &["coordination", "planning", "delegation"],
            Self::Researcher => &["research", "analysis", "search"],
            Self::Developer => &["coding", "development", "debugging"],
            Self::Analyzer => &["analysis", "metrics", "profiling"],
            Self::Reviewer => &["review", "quality", "validation"],
            Self::Tester => &["testing", "validation", "coverage"],
            Self::Documenter => &["documentation", "writing"],
            Self::Monitor => &["monitoring", "alerting", "metrics"],
            Self::Specialist => &["optimization", "maintenance", "specialist"],
        };
        tags.iter().map(|s| s.to_string()).collect()
    }
}

/// Agent availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Failed,
    Offline,
}

/// Rolling performance statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerf {
    /// Tasks completed successfully
    pub tasks_completed: u64,

    /// Tasks that failed or timed out
    pub tasks_failed: u64,

    /// Rolling mean execution time in seconds
    pub average_execution_secs: f64,
}

impl Default for AgentPerf {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            tasks_failed: 0,
            // Optimistic prior so fresh agents are not starved by
            // success-rate ranking.
            average_execution_secs: 0.0,
        }
    }
}

impl AgentPerf {
    /// Success rate over observed executions; 1.0 with no history.
    pub fn success_rate(&self) -> f64 {
        let total = self.tasks_completed + self.tasks_failed;
        if total == 0 {
            1.0
        } else {
            self.tasks_completed as f64 / total as f64
        }
    }

    /// Record one finished execution.
    pub fn record(&mut self, execution_secs: f64, success: bool) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        let total = (self.tasks_completed + self.tasks_failed) as f64;
        // Incremental mean; avoids keeping the full history.
        self.average_execution_secs += (execution_secs - self.average_execution_secs) / total;
    }
}

/// A simulated worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent ID
    pub id: AgentId,

    /// Specialization
    pub kind: AgentKind,

    /// Capability tags
    pub capabilities: HashSet<String>,

    /// Availability
    pub status: AgentStatus,

    /// Task currently executing. Invariant: `Some` iff status is `Busy`.
    pub current_task: Option<TaskId>,

    /// Rolling performance history
    pub perf: AgentPerf,
}

impl Agent {
    /// Create an idle agent of the given kind with its default capabilities
    pub fn new(kind: AgentKind) -> Self {
        Self {
            id: AgentId::new(),
            kind,
            capabilities: kind.default_capabilities(),
            status: AgentStatus::Idle,
            current_task: None,
            perf: AgentPerf::default(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    /// Mark the agent busy on a task. Called by the executor when the
    /// task actually starts.
    pub fn assign_task(&mut self, task_id: TaskId) {
        self.current_task = Some(task_id);
        self.status = AgentStatus::Busy;
    }

    /// Release the agent and fold the execution into its rolling stats.
    /// Called by the executor when the task reaches a terminal state.
    pub fn release(&mut self, execution_secs: f64, success: bool) {
        self.current_task = None;
        self.status = AgentStatus::Idle;
        self.perf.record(execution_secs, success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_creation() {
        let agent = Agent::new(AgentKind::Developer);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task.is_none());
        assert!(agent.capabilities.contains("coding"));
    }

    #[test]
    fn test_busy_iff_current_task() {
        let mut agent = Agent::new(AgentKind::Tester);
        let task_id = TaskId::new();

        agent.assign_task(task_id);
        assert_eq!(agent.status, AgentStatus::Busy);
        assert_eq!(agent.current_task, Some(task_id));

        agent.release(1.5, true);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.current_task.is_none());
    }

    #[test]
    fn test_success_rate() {
        let mut perf = AgentPerf::default();
        assert!((perf.success_rate() - 1.0).abs() < f64::EPSILON);

        perf.record(1.0, true);
        perf.record(2.0, true);
        perf.record(3.0, false);
        assert!((perf.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!((perf.average_execution_secs - 2.0).abs() < 1e-9);
    }
}
