//! Agent pool
//!
//! Owns the shared agent registry and the scaling primitives the
//! auto-scaler drives. Scaling steps are deliberately small so a noisy
//! utilization signal cannot whipsaw the pool.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::agent::{Agent, AgentId, AgentKind, SharedAgents};

/// Most agents added in one scale-up step
pub const MAX_SCALE_UP_STEP: usize = 3;

/// Most agents removed in one scale-down step
pub const MAX_SCALE_DOWN_STEP: usize = 2;

/// Pool composition snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
    pub by_kind: HashMap<String, usize>,
}

/// Shared agent registry with bounded scaling
pub struct AgentPool {
    agents: SharedAgents,
    max_agents: usize,
    /// Round-robin cursor into `AgentKind::all` for new agents
    next_kind: parking_lot::Mutex<usize>,
}

impl AgentPool {
    /// Create a pool with `initial` agents, cycling through the kind
    /// roster so every specialization is represented.
    pub fn new(initial: usize, max_agents: usize) -> Self {
        let pool = Self {
            agents: Arc::new(DashMap::new()),
            max_agents,
            next_kind: parking_lot::Mutex::new(0),
        };
        pool.add_agents(initial.min(max_agents));
        info!(agents = pool.len(), max = max_agents, "agent pool ready");
        pool
    }

    /// Handle to the registry shared with the executor.
    pub fn shared(&self) -> SharedAgents {
        Arc::clone(&self.agents)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn max_agents(&self) -> usize {
        self.max_agents
    }

    pub fn idle_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_idle()).count()
    }

    /// Copy of the current roster.
    pub fn snapshot(&self) -> Vec<Agent> {
        self.agents.iter().map(|a| a.clone()).collect()
    }

    /// Copy of at most `limit` agents, idle agents first.
    pub fn snapshot_limited(&self, limit: usize) -> Vec<Agent> {
        let mut agents = self.snapshot();
        agents.sort_by_key(|a| !a.is_idle());
        agents.truncate(limit);
        agents
    }

    /// Grow by up to `wanted` agents, bounded by the step size and the
    /// pool ceiling. Returns how many agents were actually added.
    pub fn scale_up(&self, wanted: usize) -> usize {
        let headroom = self.max_agents.saturating_sub(self.len());
        let adding = wanted.min(MAX_SCALE_UP_STEP).min(headroom);
        if adding > 0 {
            self.add_agents(adding);
            metrics::gauge!("swarmbench_pool_size").set(self.len() as f64);
            debug!(added = adding, total = self.len(), "pool scaled up");
        }
        adding
    }

    /// Shrink by up to `wanted` idle agents, bounded by the step size,
    /// keeping at least `idle_floor` idle agents around. Busy agents are
    /// never removed. Returns how many agents were removed.
    pub fn scale_down(&self, wanted: usize, idle_floor: usize) -> usize {
        let idle: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|a| a.is_idle())
            .map(|a| a.id)
            .collect();
        let removable = idle.len().saturating_sub(idle_floor);
        let removing = wanted.min(MAX_SCALE_DOWN_STEP).min(removable);

        for id in idle.into_iter().take(removing) {
            self.agents.remove(&id);
        }
        if removing > 0 {
            metrics::gauge!("swarmbench_pool_size").set(self.len() as f64);
            debug!(removed = removing, total = self.len(), "pool scaled down");
        }
        removing
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for agent in self.agents.iter() {
            stats.total += 1;
            if agent.is_idle() {
                stats.idle += 1;
            } else {
                stats.busy += 1;
            }
            *stats
                .by_kind
                .entry(format!("{:?}", agent.kind).to_lowercase())
                .or_insert(0) += 1;
        }
        stats
    }

    fn add_agents(&self, count: usize) {
        let roster = AgentKind::all();
        let mut cursor = self.next_kind.lock();
        for _ in 0..count {
            let agent = Agent::new(roster[*cursor % roster.len()]);
            *cursor += 1;
            self.agents.insert(agent.id, agent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_composition_cycles_kinds() {
        let pool = AgentPool::new(9, 32);
        let stats = pool.stats();
        assert_eq!(stats.total, 9);
        // One of each kind with 9 initial agents.
        assert_eq!(stats.by_kind.len(), AgentKind::all().len());
    }

    #[test]
    fn test_scale_up_respects_step_and_ceiling() {
        let pool = AgentPool::new(2, 4);
        assert_eq!(pool.scale_up(10), 2);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.scale_up(1), 0);
    }

    #[test]
    fn test_scale_down_keeps_idle_floor() {
        let pool = AgentPool::new(5, 32);
        assert_eq!(pool.scale_down(10, 2), 2);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.scale_down(10, 2), 1);
        assert_eq!(pool.scale_down(10, 2), 0);
    }

    #[test]
    fn test_scale_down_skips_busy_agents() {
        let pool = AgentPool::new(3, 32);
        let task = crate::model::task::TaskId::new();
        for mut agent in pool.shared().iter_mut() {
            agent.assign_task(task);
        }
        assert_eq!(pool.scale_down(3, 0), 0);
        assert_eq!(pool.len(), 3);
    }
}
