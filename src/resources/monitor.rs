//! Resource monitor
//!
//! Samples the usage probe on a fixed interval from a background tokio
//! task and keeps the latest snapshot plus a consecutive-violation
//! counter. Monitoring never blocks callers: `check_within_limits` reads
//! the latest sample; only `ResourceManager::wait_for_resources` polls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::resources::probe::{UsageProbe, UsageSample};
use crate::utils::config::ResourceSettings;

/// Handle to a spawned sampling loop; aborts the loop on drop.
pub struct MonitorHandle {
    handle: JoinHandle<()>,
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Background resource monitor
pub struct ResourceMonitor {
    probe: Arc<dyn UsageProbe>,
    settings: ResourceSettings,
    latest: RwLock<UsageSample>,
    consecutive_violations: AtomicU32,
}

impl ResourceMonitor {
    pub fn new(probe: Arc<dyn UsageProbe>, settings: ResourceSettings) -> Self {
        let initial = probe.sample();
        Self {
            probe,
            settings,
            latest: RwLock::new(initial),
            consecutive_violations: AtomicU32::new(0),
        }
    }

    /// Take one sample now, updating the latest snapshot and the
    /// violation counter.
    pub fn sample(&self) -> UsageSample {
        let sample = self.probe.sample();

        let violating = sample.cpu_percent > self.settings.max_cpu_percent
            || sample.memory_mb > self.settings.max_memory_mb as f64;

        if violating {
            let count = self.consecutive_violations.fetch_add(1, Ordering::Relaxed) + 1;
            if count == self.settings.violation_threshold {
                warn!(
                    cpu = sample.cpu_percent,
                    memory_mb = sample.memory_mb,
                    "resource limits exceeded for {} consecutive samples",
                    count
                );
            }
        } else {
            self.consecutive_violations.store(0, Ordering::Relaxed);
        }

        *self.latest.write() = sample;
        sample
    }

    /// Latest snapshot without triggering a new probe read.
    pub fn latest(&self) -> UsageSample {
        *self.latest.read()
    }

    /// True iff the latest sample is within configured ceilings and the
    /// violation streak has not crossed the threshold.
    pub fn check_within_limits(&self) -> bool {
        let sample = self.latest();
        let within = sample.cpu_percent <= self.settings.max_cpu_percent
            && sample.memory_mb <= self.settings.max_memory_mb as f64;
        within
            && self.consecutive_violations.load(Ordering::Relaxed)
                < self.settings.violation_threshold
    }

    /// Current violation streak length.
    pub fn violation_count(&self) -> u32 {
        self.consecutive_violations.load(Ordering::Relaxed)
    }

    /// Spawn the background sampling loop.
    pub fn spawn(self: &Arc<Self>) -> MonitorHandle {
        let monitor = Arc::clone(self);
        let interval = Duration::from_millis(self.settings.sample_interval_ms.max(10));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let sample = monitor.sample();
                debug!(
                    cpu = sample.cpu_percent,
                    memory_mb = sample.memory_mb,
                    "resource sample"
                );
            }
        });

        MonitorHandle { handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::probe::StaticProbe;

    fn settings() -> ResourceSettings {
        ResourceSettings {
            max_cpu_percent: 90.0,
            max_memory_mb: 8192,
            violation_threshold: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_within_limits_clean_samples() {
        let probe = Arc::new(StaticProbe::default());
        let monitor = ResourceMonitor::new(probe, settings());
        monitor.sample();
        assert!(monitor.check_within_limits());
        assert_eq!(monitor.violation_count(), 0);
    }

    #[test]
    fn test_violation_streak_degrades_check() {
        let probe = Arc::new(StaticProbe::default());
        let monitor = ResourceMonitor::new(Arc::clone(&probe) as Arc<dyn UsageProbe>, settings());

        probe.set_cpu(95.0);
        monitor.sample();
        // Sample exceeds the ceiling, so the check fails immediately.
        assert!(!monitor.check_within_limits());

        monitor.sample();
        monitor.sample();
        assert_eq!(monitor.violation_count(), 3);

        // Recovery resets the streak.
        probe.set_cpu(20.0);
        monitor.sample();
        assert_eq!(monitor.violation_count(), 0);
        assert!(monitor.check_within_limits());
    }
}
