//! Core data model
//!
//! Pure value types shared by every component:
//!
//! - **Task**: a unit of simulated work with an objective, priority, and
//!   dependencies
//! - **Agent**: a simulated worker with capabilities and a performance
//!   history
//! - **TaskResult**: the immutable record of one execution
//! - **Benchmark**: aggregate root owning a config, tasks, agents, results,
//!   and derived metrics

pub mod agent;
pub mod benchmark;
pub mod result;
pub mod task;

pub use agent::{Agent, AgentId, AgentKind, AgentPerf, AgentStatus, SharedAgents};
pub use benchmark::{Benchmark, BenchmarkConfig, BenchmarkMetrics};
pub use result::{PerformanceMetrics, ResourceUsage, ResultId, ResultStatus, TaskResult};
pub use task::{StrategyKind, Task, TaskId, TaskStatus, WorkloadClass};
