//! Usage probes
//!
//! The monitor and manager never talk to the OS directly; they read
//! samples through the `UsageProbe` trait so tests can inject
//! deterministic values.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// One point-in-time usage sample
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageSample {
    /// Aggregate CPU usage percentage (0-100)
    pub cpu_percent: f64,

    /// Memory currently used, MB
    pub memory_mb: f64,

    /// Total system memory, MB
    pub total_memory_mb: f64,

    /// Detected logical core count
    pub cpu_count: usize,
}

/// Source of usage samples
pub trait UsageProbe: Send + Sync {
    fn sample(&self) -> UsageSample;
}

/// Probe backed by `sysinfo`
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageProbe for SysinfoProbe {
    fn sample(&self) -> UsageSample {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_count = system.cpus().len().max(1);
        let cpu_percent = system
            .cpus()
            .iter()
            .map(|c| c.cpu_usage() as f64)
            .sum::<f64>()
            / cpu_count as f64;

        UsageSample {
            cpu_percent,
            memory_mb: system.used_memory() as f64 / (1024.0 * 1024.0),
            total_memory_mb: system.total_memory() as f64 / (1024.0 * 1024.0),
            cpu_count,
        }
    }
}

/// Probe returning a settable fixed sample. Used by tests and by the
/// auto-scaling scenarios that simulate sustained CPU pressure.
#[derive(Clone)]
pub struct StaticProbe {
    sample: Arc<Mutex<UsageSample>>,
}

impl StaticProbe {
    pub fn new(sample: UsageSample) -> Self {
        Self {
            sample: Arc::new(Mutex::new(sample)),
        }
    }

    /// Replace the sample returned by subsequent `sample()` calls.
    pub fn set(&self, sample: UsageSample) {
        *self.sample.lock() = sample;
    }

    pub fn set_cpu(&self, cpu_percent: f64) {
        self.sample.lock().cpu_percent = cpu_percent;
    }

    pub fn set_memory(&self, memory_mb: f64) {
        self.sample.lock().memory_mb = memory_mb;
    }
}

impl Default for StaticProbe {
    fn default() -> Self {
        Self::new(UsageSample {
            cpu_percent: 10.0,
            memory_mb: 1024.0,
            total_memory_mb: 16384.0,
            cpu_count: 8,
        })
    }
}

impl UsageProbe for StaticProbe {
    fn sample(&self) -> UsageSample {
        *self.sample.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_probe_settable() {
        let probe = StaticProbe::default();
        assert!((probe.sample().cpu_percent - 10.0).abs() < f64::EPSILON);

        probe.set_cpu(85.0);
        assert!((probe.sample().cpu_percent - 85.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sysinfo_probe_reports_cores() {
        let probe = SysinfoProbe::new();
        let sample = probe.sample();
        assert!(sample.cpu_count >= 1);
        assert!(sample.total_memory_mb > 0.0);
    }
}
