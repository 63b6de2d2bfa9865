//! Property tests for the scheduling algorithms.

use std::collections::HashSet;

use proptest::prelude::*;

use swarmbench_engine::model::agent::{Agent, AgentKind};
use swarmbench_engine::model::task::Task;
use swarmbench_engine::scheduler::{SchedulingAlgorithm, TaskScheduler};

fn agents(n: usize) -> Vec<Agent> {
    (0..n)
        .map(|i| Agent::new(AgentKind::all()[i % AgentKind::all().len()]))
        .collect()
}

fn tasks(n: usize) -> Vec<Task> {
    (0..n).map(|i| Task::new(format!("task {i}"))).collect()
}

const ALL_ALGORITHMS: [SchedulingAlgorithm; 6] = [
    SchedulingAlgorithm::RoundRobin,
    SchedulingAlgorithm::LeastLoaded,
    SchedulingAlgorithm::CapabilityBased,
    SchedulingAlgorithm::PriorityBased,
    SchedulingAlgorithm::Dynamic,
    SchedulingAlgorithm::WorkStealing,
];

proptest! {
    #[test]
    fn every_task_assigned_exactly_once(
        task_count in 1usize..60,
        agent_count in 1usize..12,
        algorithm_idx in 0usize..ALL_ALGORITHMS.len(),
    ) {
        let scheduler = TaskScheduler::default();
        let pool = agents(agent_count);
        let batch = tasks(task_count);
        let expected: HashSet<_> = batch.iter().map(|t| t.id).collect();

        let outcome = scheduler
            .schedule(batch, &pool, ALL_ALGORITHMS[algorithm_idx])
            .unwrap();

        let assigned: Vec<_> = outcome
            .assignments
            .values()
            .flatten()
            .map(|t| t.id)
            .collect();
        prop_assert_eq!(assigned.len(), task_count);
        let unique: HashSet<_> = assigned.into_iter().collect();
        prop_assert_eq!(unique, expected);
    }

    #[test]
    fn least_loaded_stays_balanced(
        task_count in 1usize..60,
        agent_count in 1usize..12,
    ) {
        let scheduler = TaskScheduler::default();
        let outcome = scheduler
            .schedule(tasks(task_count), &agents(agent_count), SchedulingAlgorithm::LeastLoaded)
            .unwrap();

        // Identical tasks on identical agents must spread evenly.
        prop_assert!(outcome.metrics.max_load - outcome.metrics.min_load <= 1);
    }

    #[test]
    fn round_robin_stays_balanced(
        task_count in 1usize..60,
        agent_count in 1usize..12,
    ) {
        let scheduler = TaskScheduler::default();
        let outcome = scheduler
            .schedule(tasks(task_count), &agents(agent_count), SchedulingAlgorithm::RoundRobin)
            .unwrap();

        prop_assert!(outcome.metrics.max_load - outcome.metrics.min_load <= 1);
    }
}

#[test]
fn ten_tasks_over_three_agents_splits_evenly() {
    let scheduler = TaskScheduler::default();
    let outcome = scheduler
        .schedule(tasks(10), &agents(3), SchedulingAlgorithm::LeastLoaded)
        .unwrap();

    let loads: Vec<usize> = outcome.assignments.values().map(|v| v.len()).collect();
    assert_eq!(loads.iter().sum::<usize>(), 10);
    assert!(loads.iter().all(|&l| l == 3 || l == 4));
}

#[test]
fn capability_scheduling_prefers_matching_agents() {
    let scheduler = TaskScheduler::default();
    let tester = Agent::new(AgentKind::Tester);
    let documenter = Agent::new(AgentKind::Documenter);
    let tester_id = tester.id;

    let batch: Vec<Task> = (0..4)
        .map(|i| Task::new(format!("verify {i}")).with_capability("testing"))
        .collect();

    let outcome = scheduler
        .schedule(batch, &[tester, documenter], SchedulingAlgorithm::CapabilityBased)
        .unwrap();

    let tester_load = outcome
        .assignments
        .get(&tester_id)
        .map(|v| v.len())
        .unwrap_or(0);
    assert_eq!(tester_load, 4);
}
