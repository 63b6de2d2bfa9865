//! Swarmbench Engine
//!
//! A multi-agent task-scheduling and coordination benchmark engine.
//! Objectives are decomposed into dependency-ordered tasks, scheduled
//! onto a pool of simulated agents, executed by a resource-aware
//! worker pool, and coordinated through pluggable topologies.
//!
//! # Architecture
//!
//! - **model**: tasks, agents, results, benchmarks
//! - **resources**: usage probes, monitoring, allocation budgets
//! - **scheduler**: dependency leveling and assignment algorithms
//! - **executor**: bounded priority queue and worker pool
//! - **coordination**: centralized/distributed/hierarchical/mesh/hybrid
//!   topologies with an injectable cost model
//! - **orchestrator**: agent pool, auto-scaling, progress, benchmarks
//! - **observability**: tracing setup
//! - **utils**: configuration and errors

pub mod coordination;
pub mod executor;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod resources;
pub mod scheduler;
pub mod utils;

pub use coordination::{CoordinationMode, CoordinationModeKind, CostModel};
pub use executor::{ExecutionMetrics, ParallelExecutor, TaskStrategy};
pub use model::agent::{Agent, AgentId, AgentKind};
pub use model::benchmark::{Benchmark, BenchmarkConfig};
pub use model::result::TaskResult;
pub use model::task::{Task, TaskId, TaskStatus};
pub use orchestrator::OrchestrationManager;
pub use scheduler::{SchedulingAlgorithm, TaskScheduler};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
