//! Coordination cost model
//!
//! Topology overhead is injectable rather than hard-wired sleeps: a
//! `CostModel` maps `(task, agent count, mode)` to a simulated delay.
//! Tests plug in `ZeroCost` for determinism; production benchmarking
//! uses `RandomizedCost`.

use std::time::Duration;

use rand::Rng;

use crate::coordination::CoordinationModeKind;
use crate::model::task::Task;

/// Injectable source of simulated coordination/communication delays
pub trait CostModel: Send + Sync {
    /// Delay the coordinator applies before delegating a task.
    fn coordination_delay(
        &self,
        task: &Task,
        agent_count: usize,
        mode: CoordinationModeKind,
    ) -> Duration;

    /// Simulated peer communication latency (meaningful for the
    /// distributed and mesh topologies; zero elsewhere by default).
    fn communication_latency(&self, mode: CoordinationModeKind) -> Duration {
        let _ = mode;
        Duration::ZERO
    }
}

/// No delays at all; the deterministic model for tests.
pub struct ZeroCost;

impl CostModel for ZeroCost {
    fn coordination_delay(&self, _: &Task, _: usize, _: CoordinationModeKind) -> Duration {
        Duration::ZERO
    }
}

/// Fixed per-mode delays with no jitter. Used when a benchmark should
/// be repeatable but still carry topology-shaped overhead.
pub struct FixedCost;

impl FixedCost {
    fn base(mode: CoordinationModeKind) -> Duration {
        match mode {
            CoordinationModeKind::Centralized => Duration::from_millis(50),
            CoordinationModeKind::Hierarchical => Duration::from_millis(80),
            CoordinationModeKind::Distributed => Duration::from_millis(150),
            CoordinationModeKind::Mesh => Duration::from_millis(200),
            // Hybrid delegates to a concrete mode per task; its own
            // dispatch is free.
            CoordinationModeKind::Hybrid => Duration::ZERO,
        }
    }
}

impl CostModel for FixedCost {
    fn coordination_delay(&self, _: &Task, _: usize, mode: CoordinationModeKind) -> Duration {
        Self::base(mode)
    }
}

/// Fixed base per mode plus bounded random jitter; the production model.
pub struct RandomizedCost {
    /// Jitter as a fraction of the base delay (0.0..=1.0)
    pub jitter_fraction: f64,
}

impl Default for RandomizedCost {
    fn default() -> Self {
        Self {
            jitter_fraction: 0.3,
        }
    }
}

impl CostModel for RandomizedCost {
    fn coordination_delay(
        &self,
        _task: &Task,
        _agent_count: usize,
        mode: CoordinationModeKind,
    ) -> Duration {
        let base = FixedCost::base(mode);
        if base.is_zero() || self.jitter_fraction <= 0.0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0.0..self.jitter_fraction);
        base.mul_f64(1.0 + jitter)
    }

    fn communication_latency(&self, mode: CoordinationModeKind) -> Duration {
        match mode {
            CoordinationModeKind::Distributed | CoordinationModeKind::Mesh => {
                Duration::from_millis(rand::thread_rng().gen_range(10..50))
            }
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_cost_is_zero() {
        let model = ZeroCost;
        let task = Task::new("x");
        for mode in CoordinationModeKind::all() {
            assert!(model.coordination_delay(&task, 4, *mode).is_zero());
        }
    }

    #[test]
    fn test_fixed_cost_per_mode() {
        let model = FixedCost;
        let task = Task::new("x");
        assert_eq!(
            model.coordination_delay(&task, 4, CoordinationModeKind::Centralized),
            Duration::from_millis(50)
        );
        assert_eq!(
            model.coordination_delay(&task, 4, CoordinationModeKind::Hierarchical),
            Duration::from_millis(80)
        );
    }

    #[test]
    fn test_randomized_cost_bounded() {
        let model = RandomizedCost::default();
        let task = Task::new("x");
        for _ in 0..50 {
            let delay = model.coordination_delay(&task, 4, CoordinationModeKind::Mesh);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(260));
        }
    }
}
