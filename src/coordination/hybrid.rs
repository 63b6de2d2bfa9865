//! Hybrid coordination
//!
//! Classifies each task and hands it to the topology that suits it:
//! small pools always go centralized, complex work climbs the
//! hierarchy, mid-weight work is auctioned among distributed
//! coordinators, and lightweight work is negotiated on the mesh.
//! Agents are partitioned across the chosen topologies in proportion
//! to how many tasks each received.

use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

use crate::coordination::{
    CentralizedMode, CoordinationContext, CoordinationMetrics, CoordinationModeKind,
    DistributedMode, HierarchicalMode, History, MeshMode,
};
use crate::model::agent::Agent;
use crate::model::result::TaskResult;
use crate::model::task::Task;
use crate::utils::errors::Result;

/// Pools smaller than this always coordinate centrally.
const SMALL_POOL: usize = 4;

/// Complexity boundaries for the hierarchical and distributed tiers
const HIERARCHICAL_THRESHOLD: f64 = 1.2;
const DISTRIBUTED_THRESHOLD: f64 = 0.8;

pub struct HybridMode {
    centralized: CentralizedMode,
    distributed: DistributedMode,
    hierarchical: HierarchicalMode,
    mesh: MeshMode,
    history: History,
}

impl HybridMode {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self {
            centralized: CentralizedMode::new(ctx.clone()),
            distributed: DistributedMode::new(ctx.clone()),
            hierarchical: HierarchicalMode::new(ctx.clone()),
            mesh: MeshMode::new(ctx),
            history: History::default(),
        }
    }

    pub async fn coordinate(&self, agents: &[Agent], tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let task_count = tasks.len();
        let groups = classify_all(agents.len(), tasks);
        debug!(
            groups = groups.len(),
            tasks = task_count,
            "hybrid coordination"
        );

        for (kind, group_tasks) in &groups {
            self.history
                .set_extra(&format!("tasks_{kind:?}").to_lowercase(), group_tasks.len() as f64);
        }

        let partitions = partition_agents(agents, &groups);

        let futures = groups
            .into_iter()
            .zip(partitions)
            .map(|((kind, group_tasks), group_agents)| async move {
                match kind {
                    CoordinationModeKind::Centralized => {
                        self.centralized.coordinate(group_agents, group_tasks).await
                    }
                    CoordinationModeKind::Distributed => {
                        self.distributed.coordinate(group_agents, group_tasks).await
                    }
                    CoordinationModeKind::Hierarchical => {
                        self.hierarchical
                            .coordinate(group_agents, group_tasks)
                            .await
                    }
                    CoordinationModeKind::Mesh => {
                        self.mesh.coordinate(group_agents, group_tasks).await
                    }
                    // classify never yields Hybrid.
                    CoordinationModeKind::Hybrid => Ok(Vec::new()),
                }
            });

        let mut results = Vec::with_capacity(task_count);
        for outcome in join_all(futures).await {
            results.extend(outcome?);
        }

        self.history
            .record(agents.len(), task_count, &results, Duration::ZERO);
        Ok(results)
    }

    pub fn metrics(&self) -> CoordinationMetrics {
        self.history.metrics()
    }
}

/// Estimated task complexity: the strategy's weight scaled by
/// objective length, capped at 2x the base weight.
fn complexity(task: &Task) -> f64 {
    let length_factor = (task.objective.len() as f64 / 200.0).min(1.0);
    task.strategy.complexity_weight() * (1.0 + length_factor)
}

fn classify(task: &Task, agent_count: usize) -> CoordinationModeKind {
    if agent_count < SMALL_POOL {
        return CoordinationModeKind::Centralized;
    }
    let complexity = complexity(task);
    if complexity >= HIERARCHICAL_THRESHOLD {
        CoordinationModeKind::Hierarchical
    } else if complexity >= DISTRIBUTED_THRESHOLD {
        CoordinationModeKind::Distributed
    } else {
        CoordinationModeKind::Mesh
    }
}

/// Group tasks by target topology, preserving submission order within
/// each group.
fn classify_all(
    agent_count: usize,
    tasks: Vec<Task>,
) -> Vec<(CoordinationModeKind, Vec<Task>)> {
    let mut groups: Vec<(CoordinationModeKind, Vec<Task>)> = Vec::new();
    for task in tasks {
        let kind = classify(&task, agent_count);
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, group)) => group.push(task),
            None => groups.push((kind, vec![task])),
        }
    }
    groups
}

/// Contiguous agent slices sized proportionally to each group's task
/// count. Every group gets at least one agent; the last group absorbs
/// the rounding remainder.
fn partition_agents<'a>(
    agents: &'a [Agent],
    groups: &[(CoordinationModeKind, Vec<Task>)],
) -> Vec<&'a [Agent]> {
    let total_tasks: usize = groups.iter().map(|(_, t)| t.len()).sum();
    let mut partitions = Vec::with_capacity(groups.len());
    let mut offset = 0;

    for (i, (_, group_tasks)) in groups.iter().enumerate() {
        let remaining_groups = groups.len() - i;
        let remaining_agents = agents.len() - offset;
        let share = if remaining_groups == 1 {
            remaining_agents
        } else {
            let proportional = agents.len() * group_tasks.len() / total_tasks.max(1);
            proportional.clamp(1, remaining_agents - (remaining_groups - 1))
        };
        partitions.push(&agents[offset..offset + share]);
        offset += share;
    }
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::agent::AgentKind;
    use crate::model::task::StrategyKind;

    #[test]
    fn test_small_pool_goes_centralized() {
        let task = Task::new("anything").with_strategy(StrategyKind::Development);
        assert_eq!(classify(&task, 3), CoordinationModeKind::Centralized);
    }

    #[test]
    fn test_complexity_tiers() {
        // Development weight 1.0; a long objective pushes it past 1.2.
        let complex = Task::new("x".repeat(200)).with_strategy(StrategyKind::Development);
        assert_eq!(classify(&complex, 8), CoordinationModeKind::Hierarchical);

        // Research weight 0.8 with a short objective lands mid-tier.
        let medium = Task::new("scan").with_strategy(StrategyKind::Research);
        assert_eq!(classify(&medium, 8), CoordinationModeKind::Distributed);

        // Maintenance weight 0.4 stays below the distributed cut.
        let light = Task::new("tidy").with_strategy(StrategyKind::Maintenance);
        assert_eq!(classify(&light, 8), CoordinationModeKind::Mesh);
    }

    #[test]
    fn test_agent_partitioning_covers_everyone() {
        let agents: Vec<Agent> = (0..8).map(|_| Agent::new(AgentKind::Developer)).collect();
        let groups = vec![
            (CoordinationModeKind::Hierarchical, vec![Task::new("a"); 6]),
            (CoordinationModeKind::Mesh, vec![Task::new("b")]),
        ];

        let partitions = partition_agents(&agents, &groups);
        assert_eq!(partitions.len(), 2);
        assert!(partitions.iter().all(|p| !p.is_empty()));
        assert_eq!(partitions.iter().map(|p| p.len()).sum::<usize>(), 8);
    }
}
