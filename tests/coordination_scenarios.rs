//! Coordination topology scenarios over a live executor.

use std::sync::Arc;
use std::time::Duration;

use swarmbench_engine::coordination::{
    CoordinationContext, CoordinationMode, CoordinationModeKind, CostModel, FixedCost, ZeroCost,
};
use swarmbench_engine::executor::{ParallelExecutor, SleepStrategy, TaskStrategy};
use swarmbench_engine::model::agent::{Agent, AgentKind};
use swarmbench_engine::model::task::{StrategyKind, Task};
use swarmbench_engine::resources::manager::ResourceManager;
use swarmbench_engine::resources::monitor::ResourceMonitor;
use swarmbench_engine::resources::probe::{StaticProbe, UsageProbe};
use swarmbench_engine::utils::config::{ExecutorSettings, ResourceSettings};

fn context(cost_model: Arc<dyn CostModel>) -> CoordinationContext {
    let probe: Arc<dyn UsageProbe> = Arc::new(StaticProbe::default());
    let resource_settings = ResourceSettings::default();
    let monitor = Arc::new(ResourceMonitor::new(probe, resource_settings.clone()));
    monitor.sample();
    let resources = Arc::new(ResourceManager::new(Arc::clone(&monitor), &resource_settings));
    let strategy: Arc<dyn TaskStrategy> = Arc::new(SleepStrategy::new(Duration::from_millis(5)));
    let executor = Arc::new(ParallelExecutor::new(
        ExecutorSettings::default(),
        resources,
        monitor,
        strategy,
        None,
    ));
    CoordinationContext {
        executor,
        cost_model,
    }
}

fn pool(n: usize) -> Vec<Agent> {
    (0..n)
        .map(|i| Agent::new(AgentKind::all()[i % AgentKind::all().len()]))
        .collect()
}

fn batch(n: usize) -> Vec<Task> {
    (0..n).map(|i| Task::new(format!("task {i}"))).collect()
}

#[tokio::test]
async fn centralized_stamps_fixed_overhead() {
    let mode = CoordinationMode::new(
        CoordinationModeKind::Centralized,
        context(Arc::new(FixedCost)),
    );
    let agents = pool(4);

    let results = mode.coordinate(&agents, batch(4)).await.unwrap();

    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(result.status.is_success());
        assert_eq!(
            result.performance.coordination_overhead,
            Duration::from_millis(50)
        );
        assert!(result.agent_id.is_some());
    }

    let metrics = mode.metrics();
    assert_eq!(metrics.invocations, 1);
    assert_eq!(metrics.total_tasks, 4);
    assert!((metrics.efficiency - 1.0).abs() < f64::EPSILON);
    assert!((metrics.average_overhead_secs - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn every_topology_returns_one_result_per_task() {
    for kind in [
        CoordinationModeKind::Centralized,
        CoordinationModeKind::Distributed,
        CoordinationModeKind::Hierarchical,
        CoordinationModeKind::Mesh,
        CoordinationModeKind::Hybrid,
    ] {
        let mode = CoordinationMode::new(kind, context(Arc::new(ZeroCost)));
        let agents = pool(6);
        let tasks = batch(8);
        let expected: std::collections::HashSet<_> = tasks.iter().map(|t| t.id).collect();

        let results = mode.coordinate(&agents, tasks).await.unwrap();

        assert_eq!(results.len(), 8, "{kind:?} lost or duplicated results");
        let seen: std::collections::HashSet<_> = results.iter().map(|r| r.task_id).collect();
        assert_eq!(seen, expected, "{kind:?} returned wrong task set");
        assert!(results.iter().all(|r| r.status.is_success()));
    }
}

#[tokio::test]
async fn empty_pool_is_an_error() {
    let mode = CoordinationMode::new(
        CoordinationModeKind::Centralized,
        context(Arc::new(ZeroCost)),
    );
    let err = mode.coordinate(&[], batch(2)).await.unwrap_err();
    assert!(matches!(
        err,
        swarmbench_engine::utils::errors::EngineError::NoAgentsAvailable(_)
    ));
}

#[tokio::test]
async fn empty_batch_yields_no_results() {
    let mode = CoordinationMode::new(
        CoordinationModeKind::Mesh,
        context(Arc::new(ZeroCost)),
    );
    let results = mode.coordinate(&pool(3), Vec::new()).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(mode.metrics().invocations, 0);
}

#[tokio::test]
async fn hybrid_routes_by_complexity() {
    let mode = CoordinationMode::new(
        CoordinationModeKind::Hybrid,
        context(Arc::new(ZeroCost)),
    );
    let agents = pool(8);

    // Mixed batch spanning the complexity tiers.
    let tasks = vec![
        Task::new("x".repeat(200)).with_strategy(StrategyKind::Development),
        Task::new("scan sources").with_strategy(StrategyKind::Research),
        Task::new("tidy").with_strategy(StrategyKind::Maintenance),
        Task::new("tidy more").with_strategy(StrategyKind::Maintenance),
    ];

    let results = mode.coordinate(&agents, tasks).await.unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.status.is_success()));

    let metrics = mode.metrics();
    assert_eq!(metrics.total_tasks, 4);
    // Extras record how many tasks each topology received.
    let routed: f64 = metrics.extras.values().sum();
    assert!((routed - 4.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn distributed_stamps_communication_latency_field() {
    let mode = CoordinationMode::new(
        CoordinationModeKind::Distributed,
        context(Arc::new(ZeroCost)),
    );
    let results = mode.coordinate(&pool(6), batch(3)).await.unwrap();

    // ZeroCost pins both overhead and latency to zero.
    for result in results {
        assert_eq!(result.performance.coordination_overhead, Duration::ZERO);
        assert_eq!(result.performance.communication_latency, Duration::ZERO);
    }
}
