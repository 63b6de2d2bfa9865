//! Distributed coordination
//!
//! Tasks are partitioned round-robin across 2-3 coordinators, and each
//! coordinator auctions its tasks to its own agent group in parallel.
//! No single agent sits on the critical path, at the price of higher
//! per-task communication overhead.

use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use tracing::debug;

use crate::coordination::{
    collect_results, planned_agent, rank_by_success, CoordinationContext, CoordinationMetrics,
    CoordinationModeKind, History, PendingResult,
};
use crate::model::agent::{Agent, AgentStatus};
use crate::model::result::TaskResult;
use crate::model::task::Task;
use crate::utils::errors::Result;

pub struct DistributedMode {
    ctx: CoordinationContext,
    history: History,
}

impl DistributedMode {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self {
            ctx,
            history: History::default(),
        }
    }

    pub async fn coordinate(&self, agents: &[Agent], tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let coordinator_count = coordinator_count(agents.len());
        debug!(
            coordinators = coordinator_count,
            tasks = tasks.len(),
            "distributed coordination"
        );

        // Best performers lead the partitions; every agent (leaders
        // included) stays eligible for work within its group.
        let ranked = rank_by_success(agents);
        let mut groups: Vec<Vec<&Agent>> = vec![Vec::new(); coordinator_count];
        for (i, agent) in ranked.into_iter().enumerate() {
            groups[i % coordinator_count].push(agent);
        }

        let mut partitions: Vec<Vec<Task>> = vec![Vec::new(); coordinator_count];
        for (i, task) in tasks.into_iter().enumerate() {
            partitions[i % coordinator_count].push(task);
        }

        let agent_count = agents.len();
        let futures = groups.iter().zip(partitions).map(|(group, partition)| {
            self.run_partition(group, partition, agent_count)
        });
        let outcomes = join_all(futures).await;

        let mut results = Vec::new();
        let mut total_overhead = Duration::ZERO;
        let mut task_count = 0;
        for outcome in outcomes {
            let (partition_results, overhead, count) = outcome?;
            results.extend(partition_results);
            total_overhead += overhead;
            task_count += count;
        }

        let mean = total_overhead / task_count.max(1) as u32;
        self.history.record(agent_count, task_count, &results, mean);
        Ok(results)
    }

    async fn run_partition(
        &self,
        group: &[&Agent],
        tasks: Vec<Task>,
        agent_count: usize,
    ) -> Result<(Vec<TaskResult>, Duration, usize)> {
        let task_count = tasks.len();
        let mut pending = Vec::with_capacity(task_count);
        let mut total_overhead = Duration::ZERO;

        for mut task in tasks {
            let delay = self.ctx.cost_model.coordination_delay(
                &task,
                agent_count,
                CoordinationModeKind::Distributed,
            );
            let latency = self
                .ctx
                .cost_model
                .communication_latency(CoordinationModeKind::Distributed);
            tokio::time::sleep(delay + latency).await;
            total_overhead += delay;

            // A scheduler placement inside this group skips the auction.
            let winner = planned_agent(&task, group).unwrap_or_else(|| auction(group, &task));
            task.assigned_agents = vec![winner.id];

            let timeout = task.timeout;
            let task_id = self.ctx.executor.submit(task)?;
            pending.push(PendingResult {
                task_id,
                timeout,
                overhead: delay,
                latency,
            });
        }

        let results = collect_results(&self.ctx.executor, pending).await;
        Ok((results, total_overhead, task_count))
    }

    pub fn metrics(&self) -> CoordinationMetrics {
        self.history.metrics()
    }
}

fn coordinator_count(agents: usize) -> usize {
    (agents / 3).clamp(2, 3).min(agents)
}

/// Highest bid wins. Bids combine history, capability fit, current
/// availability, and jitter standing in for network variance.
fn auction<'a>(group: &[&'a Agent], task: &Task) -> &'a Agent {
    let mut rng = rand::thread_rng();
    let mut winner = group[0];
    let mut best_bid = f64::MIN;
    for &agent in group {
        let load_factor = if agent.status == AgentStatus::Idle {
            1.0
        } else {
            0.5
        };
        let bid = agent.perf.success_rate()
            * task.capability_score(&agent.capabilities)
            * load_factor
            * rng.gen_range(0.8..1.2);
        if bid > best_bid {
            winner = agent;
            best_bid = bid;
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::agent::AgentKind;

    #[test]
    fn test_coordinator_count_bounds() {
        assert_eq!(coordinator_count(1), 1);
        assert_eq!(coordinator_count(2), 2);
        assert_eq!(coordinator_count(4), 2);
        assert_eq!(coordinator_count(9), 3);
        assert_eq!(coordinator_count(30), 3);
    }

    #[test]
    fn test_auction_favors_capability_fit() {
        let dev = Agent::new(AgentKind::Developer);
        let doc = Agent::new(AgentKind::Documenter);
        let group = vec![&dev, &doc];
        let task = Task::new("write a module").with_capability("coding");

        // Jitter tops out at 1.2x, which cannot overcome a zero
        // capability score.
        for _ in 0..20 {
            assert_eq!(auction(&group, &task).id, dev.id);
        }
    }
}
