//! Mesh coordination
//!
//! Every agent is a peer on a fully connected graph with randomized
//! connection strengths. Each task runs its own negotiation round:
//! every peer scores itself, the strongest claim wins. Negotiations
//! for different tasks proceed concurrently.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

use crate::coordination::{
    collect_results, CoordinationContext, CoordinationMetrics, CoordinationModeKind, History,
    PendingResult,
};
use crate::model::agent::{Agent, AgentId, AgentStatus};
use crate::model::result::TaskResult;
use crate::model::task::Task;
use crate::utils::errors::Result;

pub struct MeshMode {
    ctx: CoordinationContext,
    history: History,
}

impl MeshMode {
    pub fn new(ctx: CoordinationContext) -> Self {
        Self {
            ctx,
            history: History::default(),
        }
    }

    pub async fn coordinate(&self, agents: &[Agent], tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let strengths = connection_strengths(agents);
        let mean_strength =
            strengths.values().sum::<f64>() / strengths.len().max(1) as f64;
        self.history.set_extra("mean_connection_strength", mean_strength);
        debug!(peers = agents.len(), tasks = tasks.len(), "mesh coordination");

        let agent_count = agents.len();
        let task_count = tasks.len();
        // Claims taken during this round, so concurrent negotiations
        // spread work instead of all landing on the strongest peer.
        let claims: Mutex<HashMap<AgentId, usize>> = Mutex::new(HashMap::new());

        let negotiations = tasks.into_iter().map(|mut task| {
            let strengths = &strengths;
            let claims = &claims;
            async move {
                let delay = self.ctx.cost_model.coordination_delay(
                    &task,
                    agent_count,
                    CoordinationModeKind::Mesh,
                );
                let latency = self
                    .ctx
                    .cost_model
                    .communication_latency(CoordinationModeKind::Mesh);
                tokio::time::sleep(delay + latency).await;

                // A scheduler placement among the peers pre-empts the
                // negotiation round.
                let planned = task
                    .assigned_agents
                    .first()
                    .copied()
                    .filter(|id| agents.iter().any(|a| a.id == *id));
                let winner = {
                    let mut claims = claims.lock();
                    let winner =
                        planned.unwrap_or_else(|| negotiate(agents, &task, strengths, &claims));
                    *claims.entry(winner).or_insert(0) += 1;
                    winner
                };
                task.assigned_agents = vec![winner];

                let timeout = task.timeout;
                let task_id = self.ctx.executor.submit(task)?;
                Ok::<_, crate::utils::errors::EngineError>((
                    PendingResult {
                        task_id,
                        timeout,
                        overhead: delay,
                        latency,
                    },
                    delay,
                ))
            }
        });

        let mut pending = Vec::with_capacity(task_count);
        let mut total_overhead = Duration::ZERO;
        for outcome in join_all(negotiations).await {
            let (entry, delay) = outcome?;
            total_overhead += delay;
            pending.push(entry);
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

/// Per-peer connection strength standing in for link quality.
fn connection_strengths(agents: &[Agent]) -> HashMap<AgentId, f64> {
    let mut rng = rand::thread_rng();
    agents
        .iter()
        .map(|a| (a.id, rng.gen_range(0.5..1.0)))
        .collect()
}

/// One negotiation round: every peer scores its own claim, the
/// strongest wins.
fn negotiate(
    agents: &[Agent],
    task: &Task,
    strengths: &HashMap<AgentId, f64>,
    claims: &HashMap<AgentId, usize>,
) -> AgentId {
    let mut winner = agents[0].id;
    let mut best = f64::MIN;
    for agent in agents {
        let availability = if agent.status == AgentStatus::Idle {
            1.0
        } else {
            0.6
        };
        let claimed = claims.get(&agent.id).copied().unwrap_or(0) as f64;
        let score = strengths.get(&agent.id).copied().unwrap_or(0.5)
            * agent.perf.success_rate()
            * task.capability_score(&agent.capabilities)
            * availability
            / (1.0 + claimed);
        if score > best {
            winner = agent.id;
            best = score;
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::agent::AgentKind;

    #[test]
    fn test_negotiation_spreads_claims() {
        let agents: Vec<Agent> = (0..3).map(|_| Agent::new(AgentKind::Developer)).collect();
        let strengths: HashMap<AgentId, f64> =
            agents.iter().map(|a| (a.id, 0.9)).collect();

        let mut claims = HashMap::new();
        let task = Task::new("spread me");
        let mut winners = std::collections::HashSet::new();
        for _ in 0..3 {
            let winner = negotiate(&agents, &task, &strengths, &claims);
            *claims.entry(winner).or_insert(0) += 1;
            winners.insert(winner);
        }
        // Equal peers with claim damping should each win once.
        assert_eq!(winners.len(), 3);
    }

    #[test]
    fn test_capability_dominates_negotiation() {
        let dev = Agent::new(AgentKind::Developer);
        let doc = Agent::new(AgentKind::Documenter);
        let strengths: HashMap<AgentId, f64> =
            [(dev.id, 0.5), (doc.id, 1.0)].into_iter().collect();
        let agents = vec![dev.clone(), doc];

        let task = Task::new("refactor").with_capability("coding");
        let winner = negotiate(&agents, &task, &strengths, &HashMap::new());
        assert_eq!(winner, dev.id);
    }
}
