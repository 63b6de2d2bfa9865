//! Auto-scaling policy
//!
//! Periodically compares CPU utilization and queue-wait time against the
//! configured thresholds and nudges the pool. High CPU or long queue
//! waits grow the pool; low CPU with spare idle agents shrinks it. The
//! two triggers are intentionally asymmetric so the pool grows faster
//! than it shrinks.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::executor::ParallelExecutor;
use crate::orchestrator::pool::AgentPool;
use crate::resources::monitor::ResourceMonitor;
use crate::utils::config::OrchestrationSettings;

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    Up(usize),
    Down(usize),
    Hold,
}

pub struct AutoScaler {
    pool: Arc<AgentPool>,
    settings: OrchestrationSettings,
}

impl AutoScaler {
    pub fn new(pool: Arc<AgentPool>, settings: OrchestrationSettings) -> Self {
        Self { pool, settings }
    }

    /// Decide without acting. Pure function of the inputs and pool shape.
    pub fn evaluate(&self, cpu_percent: f64, queue_wait_secs: f64) -> ScaleAction {
        let cpu_pressure = cpu_percent > self.settings.scale_up_cpu_percent;
        let wait_pressure = queue_wait_secs > self.settings.scale_up_queue_wait_secs;
        if cpu_pressure || wait_pressure {
            let headroom = self.pool.max_agents().saturating_sub(self.pool.len());
            if headroom > 0 {
                return ScaleAction::Up(headroom);
            }
            return ScaleAction::Hold;
        }

        if cpu_percent < self.settings.scale_down_cpu_percent
            && self.pool.idle_count() > self.settings.idle_agent_floor
        {
            return ScaleAction::Down(
                self.pool.idle_count() - self.settings.idle_agent_floor,
            );
        }

        ScaleAction::Hold
    }

    /// Evaluate and apply one scaling step. Returns the applied action
    /// with the actual delta (which the pool may clamp below the
    /// requested amount).
    pub fn tick(&self, cpu_percent: f64, queue_wait_secs: f64) -> ScaleAction {
        match self.evaluate(cpu_percent, queue_wait_secs) {
            ScaleAction::Up(wanted) => {
                let added = self.pool.scale_up(wanted);
                if added > 0 {
                    info!(
                        added,
                        cpu = cpu_percent,
                        queue_wait = queue_wait_secs,
                        "scaled up"
                    );
                    ScaleAction::Up(added)
                } else {
                    ScaleAction::Hold
                }
            }
            ScaleAction::Down(wanted) => {
                let removed = self
                    .pool
                    .scale_down(wanted, self.settings.idle_agent_floor);
                if removed > 0 {
                    info!(removed, cpu = cpu_percent, "scaled down");
                    ScaleAction::Down(removed)
                } else {
                    ScaleAction::Hold
                }
            }
            ScaleAction::Hold => ScaleAction::Hold,
        }
    }

    /// Run the policy on the monitor's sampling cadence until the
    /// returned handle is dropped.
    pub fn spawn(
        self: Arc<Self>,
        monitor: Arc<ResourceMonitor>,
        executor: Arc<ParallelExecutor>,
        interval_ms: u64,
    ) -> AutoScaleHandle {
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(100)));
            loop {
                ticker.tick().await;
                let sample = monitor.latest();
                let wait = executor.average_queue_wait_secs();
                let action = self.tick(sample.cpu_percent, wait);
                if action == ScaleAction::Hold {
                    debug!(cpu = sample.cpu_percent, queue_wait = wait, "pool held");
                }
            }
        });
        AutoScaleHandle { handle }
    }
}

/// Aborts the scaling loop when dropped
pub struct AutoScaleHandle {
    handle: JoinHandle<()>,
}

impl Drop for AutoScaleHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaler(initial: usize, max: usize) -> AutoScaler {
        AutoScaler::new(
            Arc::new(AgentPool::new(initial, max)),
            OrchestrationSettings::default(),
        )
    }

    #[test]
    fn test_high_cpu_scales_up() {
        let scaler = scaler(4, 32);
        assert!(matches!(scaler.evaluate(85.0, 0.0), ScaleAction::Up(_)));
    }

    #[test]
    fn test_long_queue_wait_scales_up() {
        let scaler = scaler(4, 32);
        assert!(matches!(scaler.evaluate(30.0, 9.0), ScaleAction::Up(_)));
    }

    #[test]
    fn test_low_cpu_with_spare_idle_scales_down() {
        let scaler = scaler(6, 32);
        assert!(matches!(scaler.evaluate(10.0, 0.0), ScaleAction::Down(_)));
    }

    #[test]
    fn test_mid_range_holds() {
        let scaler = scaler(4, 32);
        assert_eq!(scaler.evaluate(50.0, 1.0), ScaleAction::Hold);
    }

    #[test]
    fn test_sustained_pressure_never_exceeds_ceiling() {
        let pool = Arc::new(AgentPool::new(4, 8));
        let scaler = AutoScaler::new(Arc::clone(&pool), OrchestrationSettings::default());

        for _ in 0..10 {
            let action = scaler.tick(85.0, 0.0);
            if let ScaleAction::Up(added) = action {
                assert!(added <= crate::orchestrator::pool::MAX_SCALE_UP_STEP);
            }
        }
        assert_eq!(pool.len(), 8);
    }
}
