//! Engine configuration
//!
//! Loads configuration from (in order of precedence):
//! 1. `SWARMBENCH_*` environment variables
//! 2. `swarmbench.toml` in the working directory (optional)
//! 3. Built-in defaults

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::utils::errors::Result;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executor settings
    #[serde(default)]
    pub executor: ExecutorSettings,

    /// Resource ceilings and budgets
    #[serde(default)]
    pub resources: ResourceSettings,

    /// Orchestration settings
    #[serde(default)]
    pub orchestration: OrchestrationSettings,
}

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Maximum concurrent tasks (also the default worker count)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Bounded priority queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Default per-task timeout in seconds
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Budget for waiting on resource availability before a task is
    /// re-enqueued, in seconds
    #[serde(default = "default_resource_wait")]
    pub resource_wait_secs: u64,

    /// Abort remaining submissions on the first failed task
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
            task_timeout_secs: default_task_timeout(),
            resource_wait_secs: default_resource_wait(),
            fail_fast: false,
        }
    }
}

/// Resource monitor/manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// Maximum CPU usage percentage before the monitor reports a violation
    #[serde(default = "default_max_cpu")]
    pub max_cpu_percent: f64,

    /// Maximum memory usage in MB before the monitor reports a violation
    #[serde(default = "default_max_memory")]
    pub max_memory_mb: u64,

    /// Consecutive violations tolerated before `check_within_limits`
    /// degrades to false
    #[serde(default = "default_violation_threshold")]
    pub violation_threshold: u32,

    /// Fraction of detected system memory available for allocation
    #[serde(default = "default_memory_budget")]
    pub memory_budget_fraction: f64,

    /// Fraction of detected CPU capacity available for allocation
    #[serde(default = "default_cpu_budget")]
    pub cpu_budget_fraction: f64,

    /// Sampling interval for the background monitor, in milliseconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            max_cpu_percent: default_max_cpu(),
            max_memory_mb: default_max_memory(),
            violation_threshold: default_violation_threshold(),
            memory_budget_fraction: default_memory_budget(),
            cpu_budget_fraction: default_cpu_budget(),
            sample_interval_ms: default_sample_interval(),
        }
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSettings {
    /// Maximum agents per benchmark (auto-scale ceiling)
    #[serde(default = "default_max_agents")]
    pub max_agents_per_benchmark: usize,

    /// Minimum idle agents kept during scale-down
    #[serde(default = "default_idle_floor")]
    pub idle_agent_floor: usize,

    /// CPU utilization above which the pool scales up (percent)
    #[serde(default = "default_scale_up_cpu")]
    pub scale_up_cpu_percent: f64,

    /// CPU utilization below which the pool scales down (percent)
    #[serde(default = "default_scale_down_cpu")]
    pub scale_down_cpu_percent: f64,

    /// Queue-wait time above which the pool scales up, in seconds
    #[serde(default = "default_scale_up_wait")]
    pub scale_up_queue_wait_secs: f64,

    /// Progress report interval in seconds
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            max_agents_per_benchmark: default_max_agents(),
            idle_agent_floor: default_idle_floor(),
            scale_up_cpu_percent: default_scale_up_cpu(),
            scale_down_cpu_percent: default_scale_down_cpu(),
            scale_up_queue_wait_secs: default_scale_up_wait(),
            progress_interval_secs: default_progress_interval(),
        }
    }
}

fn default_max_concurrent() -> usize { 8 }
fn default_queue_capacity() -> usize { 1000 }
fn default_task_timeout() -> u64 { 300 }
fn default_resource_wait() -> u64 { 5 }
fn default_max_cpu() -> f64 { 90.0 }
fn default_max_memory() -> u64 { 8192 }
fn default_violation_threshold() -> u32 { 5 }
fn default_memory_budget() -> f64 { 0.80 }
fn default_cpu_budget() -> f64 { 0.75 }
fn default_sample_interval() -> u64 { 1000 }
fn default_max_agents() -> usize { 32 }
fn default_idle_floor() -> usize { 2 }
fn default_scale_up_cpu() -> f64 { 70.0 }
fn default_scale_down_cpu() -> f64 { 20.0 }
fn default_scale_up_wait() -> f64 { 5.0 }
fn default_progress_interval() -> u64 { 5 }

impl EngineConfig {
    /// Load configuration from file and environment, falling back to
    /// defaults for anything unspecified.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("swarmbench").required(false))
            .add_source(Environment::with_prefix("SWARMBENCH").separator("__"))
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.executor.max_concurrent_tasks == 0 {
            return Err(crate::utils::errors::EngineError::InvalidConfig(
                "max_concurrent_tasks cannot be 0".into(),
            ));
        }
        if self.executor.queue_capacity == 0 {
            return Err(crate::utils::errors::EngineError::InvalidConfig(
                "queue_capacity cannot be 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resources.memory_budget_fraction) {
            return Err(crate::utils::errors::EngineError::InvalidConfig(
                "memory_budget_fraction must be between 0 and 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resources.cpu_budget_fraction) {
            return Err(crate::utils::errors::EngineError::InvalidConfig(
                "cpu_budget_fraction must be between 0 and 1".into(),
            ));
        }
        if self.orchestration.max_agents_per_benchmark == 0 {
            return Err(crate::utils::errors::EngineError::InvalidConfig(
                "max_agents_per_benchmark cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.executor.queue_capacity, 1000);
        assert_eq!(config.resources.violation_threshold, 5);
        assert_eq!(config.orchestration.max_agents_per_benchmark, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let mut config = EngineConfig::default();
        config.executor.max_concurrent_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_budget() {
        let mut config = EngineConfig::default();
        config.resources.memory_budget_fraction = 1.5;
        assert!(config.validate().is_err());
    }
}
