//! Resource manager
//!
//! Tracks per-worker allocations against a budget derived from detected
//! system totals (80% of memory, 75% of CPU capacity by default). All
//! counter mutations happen inside one mutex section; `allocate` either
//! credits the full constraint atomically or leaves the counters
//! untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::resources::monitor::ResourceMonitor;
use crate::utils::config::ResourceSettings;

/// Poll interval for `wait_for_resources`
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resource request made by a worker before starting a task
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceConstraint {
    /// Memory the task expects to use, MB
    pub memory_mb: f64,

    /// CPU the task expects to use, percentage points
    pub cpu_percent: f64,
}

#[derive(Debug, Default)]
struct AllocationState {
    allocated_memory_mb: f64,
    allocated_cpu_percent: f64,
    by_worker: HashMap<usize, ResourceConstraint>,
}

/// Budget-tracking resource manager
pub struct ResourceManager {
    monitor: Arc<ResourceMonitor>,
    available_memory_mb: f64,
    available_cpu_percent: f64,
    state: Mutex<AllocationState>,
}

impl ResourceManager {
    pub fn new(monitor: Arc<ResourceMonitor>, settings: &ResourceSettings) -> Self {
        let sample = monitor.latest();

        let available_memory_mb = sample.total_memory_mb * settings.memory_budget_fraction;
        // CPU budget in percentage points across all cores.
        let available_cpu_percent =
            sample.cpu_count as f64 * 100.0 * settings.cpu_budget_fraction;

        debug!(
            memory_mb = available_memory_mb,
            cpu_percent = available_cpu_percent,
            "resource budget initialized"
        );

        Self {
            monitor,
            available_memory_mb,
            available_cpu_percent,
            state: Mutex::new(AllocationState::default()),
        }
    }

    /// Try to credit `constraint` to `worker_id`. Succeeds iff the
    /// aggregate stays within budget; never partially credits.
    pub fn allocate(&self, worker_id: usize, constraint: ResourceConstraint) -> bool {
        let mut state = self.state.lock();

        let fits = state.allocated_memory_mb + constraint.memory_mb <= self.available_memory_mb
            && state.allocated_cpu_percent + constraint.cpu_percent
                <= self.available_cpu_percent;

        if !fits {
            trace!(worker_id, "allocation rejected: budget exhausted");
            return false;
        }

        state.allocated_memory_mb += constraint.memory_mb;
        state.allocated_cpu_percent += constraint.cpu_percent;
        state.by_worker.insert(worker_id, constraint);
        true
    }

    /// Release the allocation held by `worker_id`. No-op when the worker
    /// holds nothing, so callers may deallocate unconditionally.
    pub fn deallocate(&self, worker_id: usize) {
        let mut state = self.state.lock();
        if let Some(constraint) = state.by_worker.remove(&worker_id) {
            state.allocated_memory_mb =
                (state.allocated_memory_mb - constraint.memory_mb).max(0.0);
            state.allocated_cpu_percent =
                (state.allocated_cpu_percent - constraint.cpu_percent).max(0.0);
        }
    }

    /// Poll `check_within_limits` until it passes or the timeout elapses.
    /// This is the backpressure point before a worker starts a task.
    pub async fn wait_for_resources(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.monitor.check_within_limits() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(timeout)).await;
        }
    }

    /// Currently allocated totals `(memory_mb, cpu_percent)`.
    pub fn allocated(&self) -> (f64, f64) {
        let state = self.state.lock();
        (state.allocated_memory_mb, state.allocated_cpu_percent)
    }

    /// Budget totals `(memory_mb, cpu_percent)`.
    pub fn budget(&self) -> (f64, f64) {
        (self.available_memory_mb, self.available_cpu_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::probe::{StaticProbe, UsageProbe, UsageSample};

    fn manager() -> ResourceManager {
        let probe: Arc<dyn UsageProbe> = Arc::new(StaticProbe::new(UsageSample {
            cpu_percent: 10.0,
            memory_mb: 1024.0,
            total_memory_mb: 10_000.0,
            cpu_count: 4,
        }));
        let settings = ResourceSettings::default();
        let monitor = Arc::new(ResourceMonitor::new(probe, settings.clone()));
        ResourceManager::new(monitor, &settings)
    }

    #[test]
    fn test_budget_fractions() {
        let mgr = manager();
        let (mem, cpu) = mgr.budget();
        assert!((mem - 8000.0).abs() < 1e-6); // 10_000 * 0.80
        assert!((cpu - 300.0).abs() < 1e-6); // 4 cores * 100 * 0.75
    }

    #[test]
    fn test_allocate_never_exceeds_budget() {
        let mgr = manager();
        let big = ResourceConstraint {
            memory_mb: 5000.0,
            cpu_percent: 100.0,
        };

        assert!(mgr.allocate(1, big));
        assert!(!mgr.allocate(2, big)); // 10_000 MB > 8000 budget

        let (mem, _) = mgr.allocated();
        assert!(mem <= 8000.0);
    }

    #[test]
    fn test_deallocate_is_exact_inverse() {
        let mgr = manager();
        let before = mgr.allocated();

        let constraint = ResourceConstraint {
            memory_mb: 256.0,
            cpu_percent: 25.0,
        };
        assert!(mgr.allocate(7, constraint));
        mgr.deallocate(7);

        assert_eq!(mgr.allocated(), before);
    }

    #[test]
    fn test_deallocate_idempotent() {
        let mgr = manager();
        mgr.deallocate(42);
        mgr.deallocate(42);
        assert_eq!(mgr.allocated(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn test_wait_for_resources_times_out_under_pressure() {
        let probe = Arc::new(StaticProbe::new(UsageSample {
            cpu_percent: 99.0,
            memory_mb: 9000.0,
            total_memory_mb: 10_000.0,
            cpu_count: 4,
        }));
        let settings = ResourceSettings {
            max_cpu_percent: 90.0,
            max_memory_mb: 8192,
            ..Default::default()
        };
        let monitor = Arc::new(ResourceMonitor::new(
            Arc::clone(&probe) as Arc<dyn UsageProbe>,
            settings.clone(),
        ));
        monitor.sample();
        let mgr = ResourceManager::new(Arc::clone(&monitor), &settings);

        assert!(!mgr.wait_for_resources(Duration::from_millis(50)).await);

        // Pressure relieved: the next wait succeeds immediately.
        probe.set(UsageSample {
            cpu_percent: 10.0,
            memory_mb: 1024.0,
            total_memory_mb: 10_000.0,
            cpu_count: 4,
        });
        monitor.sample();
        assert!(mgr.wait_for_resources(Duration::from_millis(50)).await);
    }
}
