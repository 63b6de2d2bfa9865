//! Centralized coordination
//!
//! A single coordinator assigns every task sequentially. Cheapest
//! topology for small pools; the coordinator is the throughput ceiling
//! once the pool grows.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::coordination::{
    collect_results, planned_agent, rank_by_success, CoordinationContext, CoordinationMetrics,
    CoordinationModeKind, History, PendingResult,
};
use crate::model::agent::{Agent, AgentId, AgentKind};
use crate::model::result::TaskResult;
use crate::model::task::Task;
use crate::utils::errors::Result;

pub struct CentralizedMode {
    ctx: CoordinationContext,
    history: History,
}

impl CentralizedMode {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self {
            ctx,
            history: History::default(),
        }
    }

    pub async fn coordinate(&self, agents: &[Agent], tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let coordinator = elect_coordinator(agents);
        debug!(coordinator = %coordinator.id, tasks = tasks.len(), "centralized coordination");

        // The coordinator only executes work itself when it is the sole
        // agent in the pool.
        let workers: Vec<&Agent> = if agents.len() > 1 {
            agents.iter().filter(|a| a.id != coordinator.id).collect()
        } else {
            vec![coordinator]
        };

        let agent_count = agents.len();
        let task_count = tasks.len();
        let mut assigned_load: HashMap<AgentId, usize> = HashMap::new();
        let mut pending = Vec::with_capacity(task_count);
        let mut total_overhead = Duration::ZERO;

        for mut task in tasks {
            let delay = self.ctx.cost_model.coordination_delay(
                &task,
                agent_count,
                CoordinationModeKind::Centralized,
            );
            tokio::time::sleep(delay).await;
            total_overhead += delay;

            // Honor a scheduler placement when the placed agent is an
            // eligible worker; otherwise the coordinator picks.
            let worker = planned_agent(&task, &workers)
                .unwrap_or_else(|| pick_worker(&workers, &task, &assigned_load));
            *assigned_load.entry(worker.id).or_insert(0) += 1;
            task.assigned_agents = vec![worker.id];

            let timeout = task.timeout;
            let task_id = self.ctx.executor.submit(task)?;
            pending.push(PendingResult {
                task_id,
                timeout,
                overhead: delay,
                latency: Duration::ZERO,
            });
        }

        let results = collect_results(&self.ctx.executor, pending).await;
        let mean = total_overhead / task_count.max(1) as u32;
        self.history.record(agent_count, task_count, &results, mean);
        Ok(results)
    }

    pub fn metrics(&self) -> CoordinationMetrics {
        self.history.metrics()
    }
}

/// The coordinator is the best-performing agent, preferring dedicated
/// coordinators over everything else.
fn elect_coordinator(agents: &[Agent]) -> &Agent {
    let ranked = rank_by_success(agents);
    ranked
        .iter()
        .find(|a| a.kind == AgentKind::Coordinator)
        .copied()
        .unwrap_or(ranked[0])
}

/// Best capability match, breaking ties toward the lightest-loaded
/// worker so one specialist does not absorb the whole batch.
fn pick_worker<'a>(
    workers: &[&'a Agent],
    task: &Task,
    assigned_load: &HashMap<AgentId, usize>,
) -> &'a Agent {
    let mut best = workers[0];
    let mut best_key = (f64::MIN, usize::MAX);
    for &worker in workers {
        let score = task.capability_score(&worker.capabilities);
        let load = assigned_load.get(&worker.id).copied().unwrap_or(0);
        if score > best_key.0 || (score == best_key.0 && load < best_key.1) {
            best = worker;
            best_key = (score, load);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_election_prefers_coordinator_kind() {
        let mut strong = Agent::new(AgentKind::Developer);
        strong.perf.record(1.0, true);
        let coordinator = Agent::new(AgentKind::Coordinator);
        let agents = vec![strong, coordinator.clone()];

        assert_eq!(elect_coordinator(&agents).id, coordinator.id);
    }

    #[test]
    fn test_scheduler_placement_is_honored() {
        let dev = Agent::new(AgentKind::Developer);
        let tester = Agent::new(AgentKind::Tester);
        let workers = vec![&dev, &tester];

        // The capability match points at the tester, but the placement
        // points at the developer and wins.
        let mut task = Task::new("run suite").with_capability("testing");
        task.assigned_agents = vec![dev.id];
        assert_eq!(planned_agent(&task, &workers).unwrap().id, dev.id);

        // A placement outside the worker set falls through to None.
        let mut stranger = Task::new("elsewhere");
        stranger.assigned_agents = vec![AgentId::new()];
        assert!(planned_agent(&stranger, &workers).is_none());
    }

    #[test]
    fn test_worker_pick_by_capability_then_load() {
        let dev = Agent::new(AgentKind::Developer);
        let tester = Agent::new(AgentKind::Tester);
        let workers = vec![&dev, &tester];

        let task = Task::new("run suite").with_capability("testing");
        let picked = pick_worker(&workers, &task, &HashMap::new());
        assert_eq!(picked.id, tester.id);

        // With no capability preference the lighter-loaded worker wins.
        let plain = Task::new("anything");
        let mut load = HashMap::new();
        load.insert(dev.id, 3usize);
        let picked = pick_worker(&workers, &plain, &load);
        assert_eq!(picked.id, tester.id);
    }
}
