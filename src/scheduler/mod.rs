//! Task scheduler
//!
//! Assigns a batch of tasks onto a batch of agents using a selectable
//! algorithm. Before any algorithm runs, tasks are dependency-leveled and
//! ordered (level asc, priority desc, creation asc); the executor remains
//! responsible for not starting a task whose dependencies are incomplete.
//!
//! An empty agent set is not an error: `schedule` returns an empty
//! assignment and logs a warning, leaving the caller to defer or fail the
//! batch.

pub mod algorithms;
pub mod leveling;
pub mod stealing;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::agent::{Agent, AgentId};
use crate::model::task::Task;
use crate::utils::errors::Result;

pub use algorithms::{Assignment, SchedulingAlgorithm, HIGH_PRIORITY_THRESHOLD};
pub use stealing::{StealQueues, OVERLOAD_FACTOR};

use algorithms::AgentSlot;

/// Metrics for one scheduling pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulingMetrics {
    /// Tasks placed in this pass
    pub total_scheduled: usize,

    /// Scheduling wall time, seconds
    pub scheduling_secs: f64,

    /// Heaviest per-agent load after assignment
    pub max_load: usize,

    /// Lightest per-agent load after assignment
    pub min_load: usize,

    /// `1 / (1 + variance(loads))`; 1.0 is perfectly balanced
    pub load_balance_score: f64,
}

/// Output of one scheduling pass
#[derive(Debug)]
pub struct ScheduleOutcome {
    /// Agent id -> ordered task list
    pub assignments: Assignment,

    /// Pass metrics
    pub metrics: SchedulingMetrics,
}

/// Batch task scheduler
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    /// Algorithm used when `schedule` is called without an override
    pub default_algorithm: SchedulingAlgorithm,
}

impl TaskScheduler {
    pub fn new(default_algorithm: SchedulingAlgorithm) -> Self {
        Self { default_algorithm }
    }

    /// Assign `tasks` across `agents` with the given algorithm.
    pub fn schedule(
        &self,
        tasks: Vec<Task>,
        agents: &[Agent],
        algorithm: SchedulingAlgorithm,
    ) -> Result<ScheduleOutcome> {
        let started = Instant::now();
        let task_count = tasks.len();

        if agents.is_empty() {
            warn!(
                tasks = task_count,
                "no agents available; returning empty assignment"
            );
            return Ok(ScheduleOutcome {
                assignments: Assignment::new(),
                metrics: SchedulingMetrics::default(),
            });
        }

        let ordered = leveling::order_tasks(tasks)?;
        let mut slots: Vec<AgentSlot> = agents.iter().map(AgentSlot::from_agent).collect();

        let mut assignments = match algorithm {
            SchedulingAlgorithm::RoundRobin => algorithms::round_robin(ordered, &mut slots),
            SchedulingAlgorithm::LeastLoaded => algorithms::least_loaded(ordered, &mut slots),
            SchedulingAlgorithm::CapabilityBased => {
                algorithms::capability_based(ordered, &mut slots)
            }
            SchedulingAlgorithm::PriorityBased => algorithms::priority_based(ordered, &mut slots),
            SchedulingAlgorithm::Dynamic => algorithms::dynamic(ordered, &mut slots),
            SchedulingAlgorithm::WorkStealing => {
                let mut assignments = algorithms::dynamic(ordered, &mut slots);
                Self::rebalance(&mut assignments);
                assignments
            }
        };

        // Record the assignment on each task.
        for (agent_id, assigned) in assignments.iter_mut() {
            for task in assigned.iter_mut() {
                task.assigned_agents.push(*agent_id);
            }
        }

        let metrics = Self::compute_metrics(&assignments, task_count, started);
        metrics::counter!("swarmbench_tasks_scheduled").increment(task_count as u64);
        debug!(
            tasks = task_count,
            agents = agents.len(),
            algorithm = ?algorithm,
            balance = metrics.load_balance_score,
            "scheduling pass complete"
        );

        Ok(ScheduleOutcome {
            assignments,
            metrics,
        })
    }

    /// Schedule with the configured default algorithm.
    pub fn schedule_default(&self, tasks: Vec<Task>, agents: &[Agent]) -> Result<ScheduleOutcome> {
        self.schedule(tasks, agents, self.default_algorithm)
    }

    /// After a dynamic pass, low-priority tasks beyond the mean load on
    /// overloaded agents (>= OVERLOAD_FACTOR x mean) move onto steal
    /// queues, and agents below the mean pull from them in shuffled
    /// victim order. Tasks nobody steals return to their original
    /// agent, so every task stays assigned exactly once.
    fn rebalance(assignments: &mut Assignment) {
        let loads: Vec<usize> = assignments.values().map(|v| v.len()).collect();
        if loads.len() < 2 {
            return;
        }
        let mean = loads.iter().sum::<usize>() as f64 / loads.len() as f64;
        let threshold = mean * OVERLOAD_FACTOR;

        let steal_queues = StealQueues::new(assignments.keys().copied());
        for (agent_id, assigned) in assignments.iter_mut() {
            if (assigned.len() as f64) < threshold || assigned.len() <= 1 {
                continue;
            }
            let mut kept = Vec::with_capacity(assigned.len());
            for task in assigned.drain(..) {
                if task.priority < HIGH_PRIORITY_THRESHOLD && kept.len() as f64 >= mean {
                    steal_queues.push(*agent_id, task);
                } else {
                    kept.push(task);
                }
            }
            *assigned = kept;
        }

        let thieves: Vec<AgentId> = assignments
            .iter()
            .filter(|(_, assigned)| (assigned.len() as f64) < mean)
            .map(|(id, _)| *id)
            .collect();
        for thief in thieves {
            while assignments
                .get(&thief)
                .map(|assigned| (assigned.len() as f64) < mean)
                .unwrap_or(false)
            {
                let Some((task, _victim)) = steal_queues.steal_work(thief) else {
                    break;
                };
                if let Some(assigned) = assignments.get_mut(&thief) {
                    assigned.push(task);
                }
            }
        }

        for (victim, task) in steal_queues.drain() {
            if let Some(assigned) = assignments.get_mut(&victim) {
                assigned.push(task);
            }
        }
    }

    fn compute_metrics(
        assignments: &Assignment,
        task_count: usize,
        started: Instant,
    ) -> SchedulingMetrics {
        let loads: Vec<usize> = assignments.values().map(|v| v.len()).collect();
        let max_load = loads.iter().copied().max().unwrap_or(0);
        let min_load = loads.iter().copied().min().unwrap_or(0);

        let variance = if loads.is_empty() {
            0.0
        } else {
            let mean = loads.iter().sum::<usize>() as f64 / loads.len() as f64;
            loads
                .iter()
                .map(|&l| (l as f64 - mean).powi(2))
                .sum::<f64>()
                / loads.len() as f64
        };

        SchedulingMetrics {
            total_scheduled: task_count,
            scheduling_secs: started.elapsed().as_secs_f64(),
            max_load,
            min_load,
            load_balance_score: 1.0 / (1.0 + variance),
        }
    }
}
