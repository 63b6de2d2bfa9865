//! Orchestration manager
//!
//! Top-level entry point: owns the agent pool, resource monitor,
//! executor, and auto-scaler, decomposes benchmark objectives into
//! tasks, and drives each benchmark through its coordination topology.
//! Multiple benchmarks run concurrently over the same pool.

pub mod autoscale;
pub mod pool;
pub mod progress;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::coordination::{
    CoordinationContext, CoordinationMode, CostModel, RandomizedCost,
};
use crate::executor::{ParallelExecutor, SimulatedStrategy, TaskStrategy};
use crate::model::benchmark::{Benchmark, BenchmarkConfig};
use crate::model::task::{StrategyKind, Task};
use crate::resources::manager::ResourceManager;
use crate::resources::monitor::{MonitorHandle, ResourceMonitor};
use crate::resources::probe::{SysinfoProbe, UsageProbe};
use crate::scheduler::{leveling, TaskScheduler};
use crate::utils::config::EngineConfig;
use crate::utils::errors::Result;

pub use autoscale::{AutoScaleHandle, AutoScaler, ScaleAction};
pub use pool::{AgentPool, PoolStats};
pub use progress::{ProgressReport, ProgressReporter};

/// Smallest pool an orchestrator starts with
const INITIAL_POOL_SIZE: usize = 4;

/// Drain window granted to running tasks at shutdown
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

/// Top-level benchmark driver
pub struct OrchestrationManager {
    config: EngineConfig,
    pool: Arc<AgentPool>,
    monitor: Arc<ResourceMonitor>,
    executor: Arc<ParallelExecutor>,
    scheduler: TaskScheduler,
    cost_model: Arc<dyn CostModel>,
    autoscaler: Arc<AutoScaler>,
    _monitor_handle: MonitorHandle,
    _autoscale_handle: AutoScaleHandle,
}

impl OrchestrationManager {
    /// Build a manager probing the real system, with the simulated
    /// strategy and the randomized cost model.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(SysinfoProbe::new()),
            Arc::new(SimulatedStrategy::default()),
            Arc::new(RandomizedCost::default()),
        )
    }

    /// Build a manager with every seam injected. Tests pass a
    /// `StaticProbe`, a fast strategy, and `ZeroCost`.
    pub fn with_parts(
        config: EngineConfig,
        probe: Arc<dyn UsageProbe>,
        strategy: Arc<dyn TaskStrategy>,
        cost_model: Arc<dyn CostModel>,
    ) -> Result<Self> {
        config.validate()?;

        let monitor = Arc::new(ResourceMonitor::new(probe, config.resources.clone()));
        monitor.sample();
        let monitor_handle = monitor.spawn();

        let resources = Arc::new(ResourceManager::new(
            Arc::clone(&monitor),
            &config.resources,
        ));

        let pool = Arc::new(AgentPool::new(
            INITIAL_POOL_SIZE.min(config.orchestration.max_agents_per_benchmark),
            config.orchestration.max_agents_per_benchmark,
        ));

        let executor = Arc::new(ParallelExecutor::new(
            config.executor.clone(),
            resources,
            Arc::clone(&monitor),
            strategy,
            Some(pool.shared()),
        ));

        let autoscaler = Arc::new(AutoScaler::new(
            Arc::clone(&pool),
            config.orchestration.clone(),
        ));
        let autoscale_handle = Arc::clone(&autoscaler).spawn(
            Arc::clone(&monitor),
            Arc::clone(&executor),
            config.resources.sample_interval_ms,
        );

        info!(
            agents = pool.len(),
            workers = config.executor.max_concurrent_tasks,
            "orchestration manager ready"
        );

        Ok(Self {
            config,
            pool,
            monitor,
            executor,
            scheduler: TaskScheduler::default(),
            cost_model,
            autoscaler,
            _monitor_handle: monitor_handle,
            _autoscale_handle: autoscale_handle,
        })
    }

    pub fn pool(&self) -> &AgentPool {
        &self.pool
    }

    pub fn executor(&self) -> &Arc<ParallelExecutor> {
        &self.executor
    }

    pub fn autoscaler(&self) -> &AutoScaler {
        &self.autoscaler
    }

    /// Run one benchmark end to end: decompose the objective, order the
    /// tasks, coordinate execution, and collect results.
    pub async fn run_benchmark(
        &self,
        objective: impl Into<String>,
        config: BenchmarkConfig,
    ) -> Result<Benchmark> {
        config.validate()?;
        let objective = objective.into();
        let mut benchmark = Benchmark::new(objective.clone(), config.clone());

        // Grow the pool toward this benchmark's ceiling before work
        // starts; the auto-scaler handles further growth under load.
        while self.pool.len() < config.max_agents.min(self.pool.max_agents()) {
            if self.pool.scale_up(config.max_agents - self.pool.len()) == 0 {
                break;
            }
        }

        let tasks = decompose_objective(&objective, &config);
        let agents = self.pool.snapshot_limited(config.max_agents);
        benchmark.agents = agents.clone();

        // Placement pass: the scheduler levels the batch and stamps an
        // agent onto each task; coordination topologies honor in-scope
        // placements and re-place the rest.
        let outcome = self
            .scheduler
            .schedule(tasks, &agents, config.scheduling_algorithm)?;
        debug!(
            algorithm = ?config.scheduling_algorithm,
            balance = outcome.metrics.load_balance_score,
            max_load = outcome.metrics.max_load,
            "placement pass complete"
        );
        let ordered = leveling::order_tasks(
            outcome.assignments.into_values().flatten().collect(),
        )?;
        benchmark.set_tasks(ordered.clone());

        let reporter = ProgressReporter::spawn(
            Arc::clone(&self.executor),
            ordered.len(),
            Duration::from_secs(self.config.orchestration.progress_interval_secs),
            self.config.orchestration.scale_up_queue_wait_secs,
        );

        let mode = CoordinationMode::new(
            config.coordination_mode,
            CoordinationContext {
                executor: Arc::clone(&self.executor),
                cost_model: Arc::clone(&self.cost_model),
            },
        );

        debug!(
            objective = %benchmark.objective,
            tasks = ordered.len(),
            agents = agents.len(),
            mode = ?config.coordination_mode,
            "benchmark starting"
        );

        let results = mode.coordinate(&agents, ordered).await?;
        for result in results {
            benchmark.record_result(result);
        }
        benchmark.finish();
        drop(reporter);

        info!(
            objective = %benchmark.objective,
            completed = benchmark.metrics.completed_tasks,
            failed = benchmark.metrics.failed_tasks,
            wall_secs = benchmark.metrics.total_wall_secs,
            "benchmark finished"
        );
        Ok(benchmark)
    }

    /// Run several benchmarks concurrently over the shared pool.
    pub async fn run_benchmarks(
        &self,
        specs: Vec<(String, BenchmarkConfig)>,
    ) -> Result<Vec<Benchmark>> {
        let runs = specs
            .into_iter()
            .map(|(objective, config)| self.run_benchmark(objective, config));
        join_all(runs).await.into_iter().collect()
    }

    /// Stop the executor, giving running tasks a drain window.
    pub async fn shutdown(&self) {
        self.executor.shutdown(SHUTDOWN_DRAIN).await;
    }

    /// Latest resource sample, for callers surfacing system state.
    pub fn resource_sample(&self) -> crate::resources::probe::UsageSample {
        self.monitor.latest()
    }
}

/// Decompose an objective into subtasks along the strategy's phase
/// template. Every subtask carries the capability tags an agent needs
/// to score well on it; later phases depend on earlier ones.
pub fn decompose_objective(objective: &str, config: &BenchmarkConfig) -> Vec<Task> {
    // (phase, capability, priority, depends on previous phase)
    let template: &[(&str, &str, u8, bool)] = match config.strategy {
        StrategyKind::Research => &[
            ("survey prior work", "research", 6, false),
            ("gather sources", "search", 5, false),
            ("synthesize findings", "analysis", 5, true),
            ("summarize conclusions", "writing", 4, true),
        ],
        StrategyKind::Development => &[
            ("design interfaces", "planning", 7, false),
            ("implement core", "coding", 6, true),
            ("implement edge handling", "coding", 5, true),
            ("write tests", "testing", 5, true),
            ("review changes", "review", 4, true),
        ],
        StrategyKind::Analysis => &[
            ("collect metrics", "metrics", 6, false),
            ("profile hot paths", "profiling", 5, true),
            ("analyze results", "analysis", 5, true),
        ],
        StrategyKind::Testing => &[
            ("enumerate scenarios", "planning", 6, false),
            ("write test suite", "testing", 5, true),
            ("measure coverage", "coverage", 4, true),
            ("validate results", "validation", 4, true),
        ],
        StrategyKind::Optimization => &[
            ("baseline measurements", "profiling", 7, false),
            ("identify bottlenecks", "analysis", 6, true),
            ("apply optimizations", "optimization", 6, true),
            ("verify improvements", "validation", 5, true),
        ],
        StrategyKind::Maintenance => &[
            ("audit current state", "monitoring", 5, false),
            ("apply maintenance", "maintenance", 4, true),
            ("verify health", "validation", 3, true),
        ],
        StrategyKind::Auto => &[
            ("plan approach", "planning", 6, false),
            ("execute work", "coordination", 5, true),
            ("verify outcome", "validation", 4, true),
        ],
    };

    let mut tasks: Vec<Task> = Vec::with_capacity(template.len());
    let mut previous: Option<crate::model::task::TaskId> = None;
    for (phase, capability, priority, depends) in template.iter().take(config.max_tasks) {
        let mut task = Task::new(format!("{phase}: {objective}"))
            .with_strategy(config.strategy)
            .with_coordination(config.coordination_mode)
            .with_timeout(config.task_timeout)
            .with_priority(*priority)
            .with_capability(*capability);
        if *depends {
            if let Some(dep) = previous {
                task = task.with_dependency(dep);
            }
        }
        previous = Some(task.id);
        tasks.push(task);
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::CoordinationModeKind;

    #[test]
    fn test_decomposition_phases_and_dependencies() {
        let config = BenchmarkConfig {
            strategy: StrategyKind::Development,
            ..Default::default()
        };
        let tasks = decompose_objective("build the parser", &config);

        assert_eq!(tasks.len(), 5);
        assert!(tasks[0].dependencies.is_empty());
        for window in tasks.windows(2) {
            assert!(window[1].dependencies.contains(&window[0].id));
        }
        assert!(tasks[1].required_capabilities.contains("coding"));
        assert!(tasks
            .iter()
            .all(|t| t.objective.contains("build the parser")));
    }

    #[test]
    fn test_decomposition_respects_max_tasks() {
        let config = BenchmarkConfig {
            strategy: StrategyKind::Development,
            max_tasks: 2,
            ..Default::default()
        };
        let tasks = decompose_objective("tiny", &config);
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_decomposition_carries_config() {
        let config = BenchmarkConfig {
            strategy: StrategyKind::Testing,
            coordination_mode: CoordinationModeKind::Mesh,
            task_timeout: Duration::from_secs(42),
            ..Default::default()
        };
        let tasks = decompose_objective("check invariants", &config);
        assert!(tasks
            .iter()
            .all(|t| t.coordination_mode == CoordinationModeKind::Mesh));
        assert!(tasks.iter().all(|t| t.timeout == Duration::from_secs(42)));
    }
}
