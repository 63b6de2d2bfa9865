//! Execution metrics
//!
//! One mutex-guarded struct owns every counter the workers touch, so
//! updates from concurrent workers stay race-free without ad hoc
//! locking scattered across the executor.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::resources::probe::UsageSample;

/// Read-only metrics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Tasks currently waiting in the queue
    pub queued: usize,

    /// Tasks currently executing
    pub running: usize,

    /// Tasks finished successfully
    pub completed: usize,

    /// Tasks that failed
    pub failed: usize,

    /// Tasks that timed out
    pub timed_out: usize,

    /// Tasks cancelled before or during execution
    pub cancelled: usize,

    /// Tasks re-enqueued after a resource-gating failure
    pub requeued: usize,

    /// Mean wall-clock execution time, seconds
    pub average_execution_secs: f64,

    /// Rolling mean queue-wait time, seconds
    pub average_queue_wait_secs: f64,

    /// completed / total execution time
    pub throughput: f64,

    /// CPU usage at snapshot time, percent
    pub current_cpu_percent: f64,

    /// Memory at snapshot time, MB
    pub current_memory_mb: f64,

    /// Peak CPU observed, percent
    pub peak_cpu_percent: f64,

    /// Peak memory observed, MB
    pub peak_memory_mb: f64,
}

#[derive(Debug)]
struct Inner {
    queued: usize,
    running: usize,
    completed: usize,
    failed: usize,
    timed_out: usize,
    cancelled: usize,
    requeued: usize,
    total_execution_secs: f64,
    total_queue_wait_secs: f64,
    executions: u64,
    peak_cpu_percent: f64,
    peak_memory_mb: f64,
}

/// Mutex-guarded metrics tracker shared by all workers
pub struct MetricsTracker {
    inner: Mutex<Inner>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queued: 0,
                running: 0,
                completed: 0,
                failed: 0,
                timed_out: 0,
                cancelled: 0,
                requeued: 0,
                total_execution_secs: 0.0,
                total_queue_wait_secs: 0.0,
                executions: 0,
                peak_cpu_percent: 0.0,
                peak_memory_mb: 0.0,
            }),
        }
    }

    pub fn task_queued(&self) {
        self.inner.lock().queued += 1;
        metrics::gauge!("swarmbench_queue_depth").increment(1.0);
    }

    pub fn task_dequeued(&self) {
        let mut inner = self.inner.lock();
        inner.queued = inner.queued.saturating_sub(1);
        metrics::gauge!("swarmbench_queue_depth").decrement(1.0);
    }

    pub fn task_started(&self, queue_wait: Duration) {
        let mut inner = self.inner.lock();
        inner.running += 1;
        inner.total_queue_wait_secs += queue_wait.as_secs_f64();
    }

    pub fn task_requeued(&self) {
        let mut inner = self.inner.lock();
        inner.requeued += 1;
        inner.queued += 1;
    }

    /// A started task is going back to the queue for a retry attempt.
    pub fn task_retrying(&self) {
        let mut inner = self.inner.lock();
        inner.running = inner.running.saturating_sub(1);
        inner.requeued += 1;
        inner.queued += 1;
        metrics::counter!("swarmbench_tasks_retried").increment(1);
    }

    /// Fold one terminal execution into the counters.
    pub fn task_finished(&self, outcome: FinishKind, execution: Duration) {
        let mut inner = self.inner.lock();
        inner.running = inner.running.saturating_sub(1);
        inner.executions += 1;
        inner.total_execution_secs += execution.as_secs_f64();
        match outcome {
            FinishKind::Completed => {
                inner.completed += 1;
                metrics::counter!("swarmbench_tasks_completed").increment(1);
            }
            FinishKind::Failed => {
                inner.failed += 1;
                metrics::counter!("swarmbench_tasks_failed").increment(1);
            }
            FinishKind::TimedOut => {
                inner.timed_out += 1;
                metrics::counter!("swarmbench_tasks_timed_out").increment(1);
            }
            FinishKind::Cancelled => {
                inner.cancelled += 1;
                metrics::counter!("swarmbench_tasks_cancelled").increment(1);
            }
        }
    }

    /// Record a cancellation of a still-queued task.
    pub fn task_cancelled_queued(&self) {
        let mut inner = self.inner.lock();
        inner.cancelled += 1;
        metrics::counter!("swarmbench_tasks_cancelled").increment(1);
    }

    /// Observe a usage sample for the peak trackers.
    pub fn observe_usage(&self, sample: &UsageSample) {
        let mut inner = self.inner.lock();
        if sample.cpu_percent > inner.peak_cpu_percent {
            inner.peak_cpu_percent = sample.cpu_percent;
        }
        if sample.memory_mb > inner.peak_memory_mb {
            inner.peak_memory_mb = sample.memory_mb;
        }
    }

    /// Average time tasks spent queued before starting, seconds.
    pub fn average_queue_wait_secs(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.executions == 0 && inner.running == 0 {
            0.0
        } else {
            let waits = inner.executions + inner.running as u64;
            inner.total_queue_wait_secs / waits.max(1) as f64
        }
    }

    /// Terminal counts `(completed, failed_like)` where failed_like
    /// includes failures, timeouts, and cancellations.
    pub fn terminal_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (
            inner.completed,
            inner.failed + inner.timed_out + inner.cancelled,
        )
    }

    /// Build a snapshot, stamping in the latest usage sample.
    pub fn snapshot(&self, sample: UsageSample) -> ExecutionMetrics {
        let inner = self.inner.lock();
        let average_execution_secs = if inner.executions == 0 {
            0.0
        } else {
            inner.total_execution_secs / inner.executions as f64
        };
        let average_queue_wait_secs = if inner.executions == 0 {
            0.0
        } else {
            inner.total_queue_wait_secs / inner.executions as f64
        };
        let throughput = if inner.total_execution_secs > 0.0 {
            inner.completed as f64 / inner.total_execution_secs
        } else {
            0.0
        };
        ExecutionMetrics {
            queued: inner.queued,
            running: inner.running,
            completed: inner.completed,
            failed: inner.failed,
            timed_out: inner.timed_out,
            cancelled: inner.cancelled,
            requeued: inner.requeued,
            average_execution_secs,
            average_queue_wait_secs,
            throughput,
            current_cpu_percent: sample.cpu_percent,
            current_memory_mb: sample.memory_mb,
            peak_cpu_percent: inner.peak_cpu_percent.max(sample.cpu_percent),
            peak_memory_mb: inner.peak_memory_mb.max(sample.memory_mb),
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal outcome kinds the tracker distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishKind {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_averages() {
        let tracker = MetricsTracker::new();

        tracker.task_queued();
        tracker.task_queued();
        tracker.task_dequeued();
        tracker.task_started(Duration::from_millis(100));
        tracker.task_finished(FinishKind::Completed, Duration::from_secs(2));

        tracker.task_dequeued();
        tracker.task_started(Duration::from_millis(300));
        tracker.task_finished(FinishKind::Failed, Duration::from_secs(4));

        let snapshot = tracker.snapshot(UsageSample::default());
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.running, 0);
        assert_eq!(snapshot.queued, 0);
        assert!((snapshot.average_execution_secs - 3.0).abs() < 1e-9);
        assert!((snapshot.average_queue_wait_secs - 0.2).abs() < 1e-9);
        // throughput = 1 completed / 6s total execution
        assert!((snapshot.throughput - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_tracking() {
        let tracker = MetricsTracker::new();
        tracker.observe_usage(&UsageSample {
            cpu_percent: 55.0,
            memory_mb: 2048.0,
            ..Default::default()
        });
        tracker.observe_usage(&UsageSample {
            cpu_percent: 30.0,
            memory_mb: 1024.0,
            ..Default::default()
        });

        let snapshot = tracker.snapshot(UsageSample::default());
        assert!((snapshot.peak_cpu_percent - 55.0).abs() < f64::EPSILON);
        assert!((snapshot.peak_memory_mb - 2048.0).abs() < f64::EPSILON);
    }
}
