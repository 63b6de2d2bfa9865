//! Progress reporting
//!
//! A background task publishes a `ProgressReport` on a watch channel at
//! the configured cadence while a benchmark runs. Consumers read the
//! latest report without backpressure on the reporter; reports also go
//! to the log at info level.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::executor::ParallelExecutor;

/// Failure fraction above which the reporter warns
const FAILURE_WARN_FRACTION: f64 = 0.25;

/// Point-in-time benchmark progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Tasks expected overall
    pub total: usize,

    /// Tasks finished successfully
    pub completed: usize,

    /// Tasks failed, timed out, or cancelled
    pub failed: usize,

    /// Tasks currently executing
    pub running: usize,

    /// Tasks waiting in the queue
    pub queued: usize,

    /// completed / total
    pub fraction_done: f64,

    /// Rolling average queue wait, seconds
    pub average_queue_wait_secs: f64,

    /// Report timestamp
    pub at: Option<DateTime<Utc>>,
}

impl ProgressReport {
    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed + self.failed >= self.total
    }
}

/// Handle to the reporting loop; aborts it on drop
pub struct ProgressReporter {
    receiver: watch::Receiver<ProgressReport>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Spawn the reporting loop. `total` is the number of tasks the
    /// benchmark expects; the loop ends on its own once they are all
    /// terminal.
    pub fn spawn(
        executor: Arc<ParallelExecutor>,
        total: usize,
        interval: Duration,
        warn_queue_wait_secs: f64,
    ) -> Self {
        let (sender, receiver) = watch::channel(ProgressReport::default());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(100)));
            loop {
                ticker.tick().await;
                let report = build_report(&executor, total);

                info!(
                    completed = report.completed,
                    failed = report.failed,
                    total = report.total,
                    running = report.running,
                    queued = report.queued,
                    "benchmark progress"
                );

                let terminal = report.completed + report.failed;
                if terminal > 0
                    && report.failed as f64 / terminal as f64 > FAILURE_WARN_FRACTION
                {
                    warn!(
                        failed = report.failed,
                        terminal, "failure rate above warning threshold"
                    );
                }
                if report.average_queue_wait_secs > warn_queue_wait_secs {
                    warn!(
                        queue_wait_secs = report.average_queue_wait_secs,
                        "tasks queueing longer than expected"
                    );
                }

                let finished = report.is_finished();
                if sender.send(report).is_err() || finished {
                    break;
                }
            }
        });

        Self { receiver, handle }
    }

    /// Latest published report.
    pub fn latest(&self) -> ProgressReport {
        self.receiver.borrow().clone()
    }

    /// A receiver for callers that want to await changes.
    pub fn subscribe(&self) -> watch::Receiver<ProgressReport> {
        self.receiver.clone()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn build_report(executor: &ParallelExecutor, total: usize) -> ProgressReport {
    let metrics = executor.metrics();
    let completed = metrics.completed;
    let failed = metrics.failed + metrics.timed_out + metrics.cancelled;
    ProgressReport {
        total,
        completed,
        failed,
        running: metrics.running,
        queued: metrics.queued,
        fraction_done: if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        },
        average_queue_wait_secs: metrics.average_queue_wait_secs,
        at: Some(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_detection() {
        let report = ProgressReport {
            total: 4,
            completed: 3,
            failed: 1,
            ..Default::default()
        };
        assert!(report.is_finished());

        let unfinished = ProgressReport {
            total: 4,
            completed: 2,
            failed: 1,
            ..Default::default()
        };
        assert!(!unfinished.is_finished());

        // Zero expected tasks never reads as finished.
        assert!(!ProgressReport::default().is_finished());
    }
}
