//! Hierarchical coordination
//!
//! A three-level tree: the best performer becomes the root, the next
//! tier become managers, everyone else is a worker. The root
//! round-robins tasks to managers; each manager delegates to the best
//! idle worker in its subtree or executes the task itself when the
//! subtree is empty.

use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

use crate::coordination::{
    collect_results, planned_agent, rank_by_success, CoordinationContext, CoordinationMetrics,
    CoordinationModeKind, History, PendingResult,
};
use crate::model::agent::{Agent, AgentStatus};
use crate::model::result::TaskResult;
use crate::model::task::Task;
use crate::utils::errors::Result;

/// Managers directly under the root
const MAX_MANAGERS: usize = 3;

pub struct HierarchicalMode {
    ctx: CoordinationContext,
    history: History,
}

impl HierarchicalMode {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self {
            ctx,
            history: History::default(),
        }
    }

    pub async fn coordinate(&self, agents: &[Agent], tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let tree = Tree::build(agents);
        debug!(
            managers = tree.subtrees.len(),
            tasks = tasks.len(),
            "hierarchical coordination"
        );

        // Root dispatch: round-robin over managers.
        let manager_count = tree.subtrees.len();
        let mut batches: Vec<Vec<Task>> = vec![Vec::new(); manager_count];
        for (i, task) in tasks.into_iter().enumerate() {
            batches[i % manager_count].push(task);
        }

        let agent_count = agents.len();
        let futures = tree
            .subtrees
            .iter()
            .zip(batches)
            .map(|(subtree, batch)| self.run_subtree(subtree, batch, agent_count));
        let outcomes = join_all(futures).await;

        let mut results = Vec::new();
        let mut total_overhead = Duration::ZERO;
        let mut task_count = 0;
        for outcome in outcomes {
            let (subtree_results, overhead, count) = outcome?;
            results.extend(subtree_results);
            total_overhead += overhead;
            task_count += count;
        }

        let mean = total_overhead / task_count.max(1) as u32;
        self.history.record(agent_count, task_count, &results, mean);
        Ok(results)
    }

    async fn run_subtree(
        &self,
        subtree: &Subtree<'_>,
        tasks: Vec<Task>,
        agent_count: usize,
    ) -> Result<(Vec<TaskResult>, Duration, usize)> {
        let task_count = tasks.len();
        let mut pending = Vec::with_capacity(task_count);
        let mut total_overhead = Duration::ZERO;

        for mut task in tasks {
            // One delay covers both hops (root to manager, manager to
            // worker).
            let delay = self.ctx.cost_model.coordination_delay(
                &task,
                agent_count,
                CoordinationModeKind::Hierarchical,
            );
            tokio::time::sleep(delay).await;
            total_overhead += delay;

            let executor_agent = subtree.delegate(&task);
            task.assigned_agents = vec![executor_agent.id];

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
        Ok((results, total_overhead, task_count))
    }

    pub fn metrics(&self) -> CoordinationMetrics {
        self.history.metrics()
    }
}

struct Subtree<'a> {
    manager: &'a Agent,
    workers: Vec<&'a Agent>,
}

impl Subtree<'_> {
    /// Best idle worker by capability fit, falling back to any worker,
    /// then to the manager itself. A scheduler placement pointing at an
    /// agent inside this subtree is honored as-is.
    fn delegate(&self, task: &Task) -> &Agent {
        if let Some(planned) = planned_agent(task, &self.workers) {
            return planned;
        }
        if task.assigned_agents.first() == Some(&self.manager.id) {
            return self.manager;
        }

        let idle: Vec<&Agent> = self
            .workers
            .iter()
            .copied()
            .filter(|w| w.status == AgentStatus::Idle)
            .collect();

        best_fit(&idle, task)
            .or_else(|| best_fit(&self.workers, task))
            .unwrap_or(self.manager)
    }
}

fn best_fit<'a>(pool: &[&'a Agent], task: &Task) -> Option<&'a Agent> {
    pool.iter().copied().max_by(|a, b| {
        task.capability_score(&a.capabilities)
            .partial_cmp(&task.capability_score(&b.capabilities))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

struct Tree<'a> {
    subtrees: Vec<Subtree<'a>>,
}

impl<'a> Tree<'a> {
    fn build(agents: &'a [Agent]) -> Self {
        let ranked = rank_by_success(agents);

        // Root never executes; with fewer than three agents the tree
        // degenerates and everyone works.
        if ranked.len() < 3 {
            return Self {
                subtrees: vec![Subtree {
                    manager: ranked[0],
                    workers: ranked,
                }],
            };
        }

        let manager_count = (ranked.len() - 1).min(MAX_MANAGERS);
        let managers = &ranked[1..1 + manager_count];
        let workers = &ranked[1 + manager_count..];

        let mut subtrees: Vec<Subtree<'a>> = managers
            .iter()
            .map(|&manager| Subtree {
                manager,
                workers: Vec::new(),
            })
            .collect();
        for (i, &worker) in workers.iter().enumerate() {
            subtrees[i % manager_count].workers.push(worker);
        }

        Self { subtrees }
    }
}
