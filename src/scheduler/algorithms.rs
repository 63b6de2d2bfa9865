//! Assignment algorithms
//!
//! Six interchangeable algorithms mapping an ordered task batch onto a
//! set of agents. All are deterministic given the same inputs and agent
//! state; every task lands in exactly one agent's list.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::agent::{Agent, AgentId};
use crate::model::task::Task;

/// Selectable assignment algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingAlgorithm {
    RoundRobin,
    LeastLoaded,
    CapabilityBased,
    PriorityBased,
    Dynamic,
    WorkStealing,
}

impl Default for SchedulingAlgorithm {
    fn default() -> Self {
        Self::Dynamic
    }
}

/// Priority at or above which a task is treated as high-priority by the
/// priority-based and work-stealing algorithms.
pub const HIGH_PRIORITY_THRESHOLD: u8 = 5;

/// Per-agent scoring inputs, tracked as assignment progresses
#[derive(Debug, Clone)]
pub(crate) struct AgentSlot {
    pub id: AgentId,
    pub capabilities: std::collections::HashSet<String>,
    pub success_rate: f64,
    pub load: usize,
}

impl AgentSlot {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            capabilities: agent.capabilities.clone(),
            success_rate: agent.perf.success_rate(),
            // Busy agents start with one in-flight task counted.
            load: usize::from(!agent.is_idle()),
        }
    }
}

/// Assignment output: agent -> ordered task list
pub type Assignment = HashMap<AgentId, Vec<Task>>;

fn empty_assignment(slots: &[AgentSlot]) -> Assignment {
    slots.iter().map(|s| (s.id, Vec::new())).collect()
}

/// Tasks distributed by index modulo agent count.
pub(crate) fn round_robin(tasks: Vec<Task>, slots: &mut [AgentSlot]) -> Assignment {
    let mut assignment = empty_assignment(slots);
    for (i, task) in tasks.into_iter().enumerate() {
        let slot = &mut slots[i % slots.len()];
        slot.load += 1;
        assignment.get_mut(&slot.id).expect("slot present").push(task);
    }
    assignment
}

/// Min-heap on current load; always assign to the lightest agent.
pub(crate) fn least_loaded(tasks: Vec<Task>, slots: &mut [AgentSlot]) -> Assignment {
    let mut assignment = empty_assignment(slots);

    // (load, index) min-heap; the index makes ties deterministic.
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> = slots
        .iter()
        .enumerate()
        .map(|(i, s)| Reverse((s.load, i)))
        .collect();

    for task in tasks {
        let Reverse((load, idx)) = heap.pop().expect("heap never empty");
        let slot = &mut slots[idx];
        slot.load = load + 1;
        assignment.get_mut(&slot.id).expect("slot present").push(task);
        heap.push(Reverse((slot.load, idx)));
    }

    assignment
}

/// Best capability-tag match; ties broken by lower current workload;
/// tasks no agent matches at all fall back to least-loaded placement.
pub(crate) fn capability_based(tasks: Vec<Task>, slots: &mut [AgentSlot]) -> Assignment {
    let mut assignment = empty_assignment(slots);

    for task in tasks {
        let mut best: Option<(usize, f64)> = None;
        for (i, slot) in slots.iter().enumerate() {
            let score = task.capability_score(&slot.capabilities);
            let candidate = (i, score);
            best = match best {
                None => Some(candidate),
                Some((bi, bs)) => {
                    if score > bs
                        || (score == bs && slot.load < slots[bi].load)
                    {
                        Some(candidate)
                    } else {
                        Some((bi, bs))
                    }
                }
            };
        }

        let idx = match best {
            Some((i, score)) if score > 0.0 => i,
            // No agent carries any required capability: least-loaded fallback.
            _ => lightest(slots),
        };

        slots[idx].load += 1;
        assignment
            .get_mut(&slots[idx].id)
            .expect("slot present")
            .push(task);
    }

    assignment
}

/// High-priority tasks round-robined across agents ranked by success
/// rate; the rest go to the least-loaded agent.
pub(crate) fn priority_based(tasks: Vec<Task>, slots: &mut [AgentSlot]) -> Assignment {
    let mut assignment = empty_assignment(slots);

    // Agent indices ranked by historical success rate, best first.
    let mut ranked: Vec<usize> = (0..slots.len()).collect();
    ranked.sort_by(|&a, &b| {
        slots[b]
            .success_rate
            .partial_cmp(&slots[a].success_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rr = 0usize;
    for task in tasks {
        let idx = if task.priority >= HIGH_PRIORITY_THRESHOLD {
            let idx = ranked[rr % ranked.len()];
            rr += 1;
            idx
        } else {
            lightest(slots)
        };

        slots[idx].load += 1;
        assignment
            .get_mut(&slots[idx].id)
            .expect("slot present")
            .push(task);
    }

    assignment
}

/// Weighted composite score per agent:
/// `0.4 * capability + 0.3 * (1 - normalized workload) + 0.3 * success rate`.
pub(crate) fn dynamic(tasks: Vec<Task>, slots: &mut [AgentSlot]) -> Assignment {
    let mut assignment = empty_assignment(slots);

    for task in tasks {
        let max_load = slots.iter().map(|s| s.load).max().unwrap_or(0).max(1);

        let mut best_idx = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (i, slot) in slots.iter().enumerate() {
            let capability = task.capability_score(&slot.capabilities);
            let workload = 1.0 - slot.load as f64 / max_load as f64;
            let score = 0.4 * capability + 0.3 * workload + 0.3 * slot.success_rate;

            // Strictly-greater keeps ties on the earlier (lighter, since
            // loads update as we assign) agent.
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }

        slots[best_idx].load += 1;
        assignment
            .get_mut(&slots[best_idx].id)
            .expect("slot present")
            .push(task);
    }

    assignment
}

fn lightest(slots: &[AgentSlot]) -> usize {
    slots
        .iter()
        .enumerate()
        .min_by_key(|(i, s)| (s.load, *i))
        .map(|(i, _)| i)
        .expect("slots non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::agent::AgentKind;

    fn slots(n: usize) -> Vec<AgentSlot> {
        (0..n)
            .map(|_| AgentSlot::from_agent(&Agent::new(AgentKind::Developer)))
            .collect()
    }

    fn tasks(n: usize) -> Vec<Task> {
        (0..n).map(|i| Task::new(format!("task {i}"))).collect()
    }

    fn loads(assignment: &Assignment) -> Vec<usize> {
        assignment.values().map(|v| v.len()).collect()
    }

    #[test]
    fn test_round_robin_even_split() {
        let mut s = slots(3);
        let assignment = round_robin(tasks(9), &mut s);
        assert!(loads(&assignment).iter().all(|&l| l == 3));
    }

    #[test]
    fn test_least_loaded_balance() {
        let mut s = slots(3);
        let assignment = least_loaded(tasks(10), &mut s);
        let loads = loads(&assignment);
        assert_eq!(loads.iter().sum::<usize>(), 10);
        assert!(loads.iter().max().unwrap() - loads.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_dynamic_balance_with_equal_inputs() {
        let mut s = slots(4);
        let assignment = dynamic(tasks(8), &mut s);
        let loads = loads(&assignment);
        assert_eq!(loads.iter().sum::<usize>(), 8);
        assert!(loads.iter().max().unwrap() - loads.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_capability_based_prefers_match() {
        let matching = Agent::new(AgentKind::Developer); // carries "coding"
        let other = Agent::new(AgentKind::Documenter);
        let mut s = vec![
            AgentSlot::from_agent(&other),
            AgentSlot::from_agent(&matching),
        ];

        let task = Task::new("implement").with_capability("coding");
        let assignment = capability_based(vec![task], &mut s);
        assert_eq!(assignment[&matching.id].len(), 1);
        assert!(assignment[&other.id].is_empty());
    }

    #[test]
    fn test_capability_fallback_least_loaded() {
        let mut s = slots(2);
        s[0].load = 3;
        let task = Task::new("exotic").with_capability("quantum-annealing");
        let assignment = capability_based(vec![task], &mut s);
        assert_eq!(assignment[&s[1].id].len(), 1);
    }

    #[test]
    fn test_priority_based_split() {
        let mut s = slots(2);
        let mut batch = tasks(2);
        batch[0].priority = 9; // high: round-robined by success rate
        batch[1].priority = 1; // low: least loaded

        let assignment = priority_based(batch, &mut s);
        assert_eq!(loads(&assignment).iter().sum::<usize>(), 2);
    }
}
