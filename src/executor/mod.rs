//! Resource-aware parallel executor
//!
//! Accepts tasks with priorities into a bounded queue and runs a fixed
//! pool of workers that pop, resource-gate, execute via the pluggable
//! strategy, and record results. Per task: `queued -> running ->
//! {completed | failed | timed_out}`, with `cancelled` reachable from
//! `queued` or `running`.
//!
//! Failure semantics: strategy errors become failed results; resource
//! exhaustion re-queues the task; only submission-time conditions
//! (queue full, shutdown) surface as errors to the caller.

pub mod metrics;
pub mod queue;
pub mod strategy;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::agent::SharedAgents;
use crate::model::result::TaskResult;
use crate::model::task::{Task, TaskId, TaskStatus};
use crate::resources::manager::ResourceManager;
use crate::resources::monitor::ResourceMonitor;
use crate::utils::config::ExecutorSettings;
use crate::utils::errors::{EngineError, Result};

pub use metrics::{ExecutionMetrics, MetricsTracker};
pub use queue::TaskQueue;
pub use strategy::{FailingStrategy, FnStrategy, SimulatedStrategy, SleepStrategy, TaskStrategy};

/// Poll interval for `get_result` / `wait_for_completion`
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// State shared between the executor facade and its workers
pub(crate) struct Shared {
    pub queue: TaskQueue,
    pub results: DashMap<TaskId, TaskResult>,
    pub statuses: DashMap<TaskId, TaskStatus>,
    pub cancels: DashMap<TaskId, Arc<Notify>>,
    /// Tasks popped with incomplete dependencies, held off-queue so they
    /// cannot starve lower-priority work they depend on.
    pub parked: Mutex<Vec<queue::QueuedTask>>,
    pub agents: Option<SharedAgents>,
    pub resources: Arc<ResourceManager>,
    pub monitor: Arc<ResourceMonitor>,
    pub strategy: Arc<dyn TaskStrategy>,
    pub tracker: MetricsTracker,
    pub cpu_gate: Arc<Semaphore>,
    pub shutdown: AtomicBool,
    pub fail_fast_tripped: AtomicBool,
    pub submitted: AtomicUsize,
    pub settings: ExecutorSettings,
}

impl Shared {
    /// Return every parked entry to the queue. Called whenever a task
    /// reaches a terminal state, since that can unblock dependents.
    pub(crate) fn wake_parked(&self) {
        let entries: Vec<queue::QueuedTask> = {
            let mut parked = self.parked.lock();
            parked.drain(..).collect()
        };
        for entry in entries {
            self.queue.requeue(entry.task, entry.retry_count);
        }
    }
}

/// Priority-queue-fed worker pool
pub struct ParallelExecutor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ParallelExecutor {
    /// Spawn the worker pool. Must be called within a tokio runtime.
    ///
    /// `agents` is optional: when provided, workers mark agents busy on
    /// start and release them (folding the execution into their rolling
    /// stats) on finish.
    pub fn new(
        settings: ExecutorSettings,
        resources: Arc<ResourceManager>,
        monitor: Arc<ResourceMonitor>,
        strategy: Arc<dyn TaskStrategy>,
        agents: Option<SharedAgents>,
    ) -> Self {
        let worker_count = settings.max_concurrent_tasks.max(1);
        let cpu_slots = monitor.latest().cpu_count.max(1);

        let shared = Arc::new(Shared {
            queue: TaskQueue::new(settings.queue_capacity),
            results: DashMap::new(),
            statuses: DashMap::new(),
            cancels: DashMap::new(),
            parked: Mutex::new(Vec::new()),
            agents,
            resources,
            monitor,
            strategy,
            tracker: MetricsTracker::new(),
            cpu_gate: Arc::new(Semaphore::new(cpu_slots)),
            shutdown: AtomicBool::new(false),
            fail_fast_tripped: AtomicBool::new(false),
            submitted: AtomicUsize::new(0),
            settings,
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                tokio::spawn(worker::run_worker(shared, worker_id))
            })
            .collect();

        info!(workers = worker_count, "parallel executor started");

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a task at its own priority. Fails with `QueueFull` when the
    /// bounded queue is at capacity, or `Shutdown` once the executor is
    /// stopping (or fail-fast has tripped).
    pub fn submit(&self, task: Task) -> Result<TaskId> {
        if self.shared.shutdown.load(Ordering::Acquire)
            || self.shared.fail_fast_tripped.load(Ordering::Acquire)
        {
            return Err(EngineError::Shutdown);
        }

        let task_id = task.id;
        self.shared.statuses.insert(task_id, TaskStatus::Pending);
        if let Err(e) = self.shared.queue.push(task) {
            self.shared.statuses.remove(&task_id);
            return Err(e);
        }
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);
        self.shared.tracker.task_queued();
        debug!(task = %task_id, "task submitted");
        Ok(task_id)
    }

    /// Submit many tasks. Each is queued individually; there is no
    /// rollback, tasks queued before a failure stay queued.
    pub fn submit_batch(&self, tasks: Vec<Task>) -> Result<Vec<TaskId>> {
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(self.submit(task)?);
        }
        Ok(ids)
    }

    /// Result for a task if it has already reached a terminal state.
    pub fn try_get_result(&self, task_id: TaskId) -> Option<TaskResult> {
        self.shared.results.get(&task_id).map(|r| r.clone())
    }

    /// Poll until the task reaches a terminal state or the timeout
    /// elapses. Never blocks indefinitely.
    pub async fn get_result(&self, task_id: TaskId, timeout: Duration) -> Option<TaskResult> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(result) = self.try_get_result(task_id) {
                return Some(result);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
        }
    }

    /// True iff every submitted task reached a terminal state before the
    /// timeout.
    pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let submitted = self.shared.submitted.load(Ordering::Acquire);
            let (completed, failed_like) = self.shared.tracker.terminal_counts();
            if completed + failed_like >= submitted {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
        }
    }

    /// Cancel a task. Queued tasks are removed and recorded as
    /// cancelled; running tasks are signalled cooperatively. Returns
    /// false when the task is unknown or already terminal.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        if let Some(entry) = self.shared.queue.remove(task_id) {
            self.shared.statuses.insert(task_id, TaskStatus::Cancelled);
            self.shared.tracker.task_dequeued();
            self.shared.tracker.task_cancelled_queued();
            self.shared.results.insert(
                task_id,
                TaskResult::cancelled(task_id, entry.task.assigned_agents.first().copied()),
            );
            self.shared.wake_parked();
            debug!(task = %task_id, "cancelled while queued");
            return true;
        }

        match self.shared.statuses.get(&task_id).map(|s| *s) {
            Some(TaskStatus::Running) => {
                if let Some(cancel) = self.shared.cancels.get(&task_id) {
                    // notify_one stores a permit, so the signal is not
                    // lost if the worker has not reached its select yet.
                    cancel.notify_one();
                    debug!(task = %task_id, "cancellation signalled");
                    return true;
                }
                false
            }
            Some(TaskStatus::Pending) => {
                // Popped but not yet started; the worker observes the
                // status before executing.
                self.shared.statuses.insert(task_id, TaskStatus::Cancelled);
                true
            }
            _ => false,
        }
    }

    /// Live metrics snapshot.
    pub fn metrics(&self) -> ExecutionMetrics {
        self.shared.tracker.snapshot(self.shared.monitor.latest())
    }

    /// Rolling average queue-wait time, seconds. Feeds auto-scaling.
    pub fn average_queue_wait_secs(&self) -> f64 {
        self.shared.tracker.average_queue_wait_secs()
    }

    /// Tasks submitted since startup.
    pub fn submitted_count(&self) -> usize {
        self.shared.submitted.load(Ordering::Acquire)
    }

    /// Current queue depth.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Status of a known task.
    pub fn task_status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.shared.statuses.get(&task_id).map(|s| *s)
    }

    /// Stop accepting work, cancel everything still queued, and give
    /// running tasks `drain` to finish before workers are aborted.
    pub async fn shutdown(&self, drain: Duration) {
        info!("executor shutting down");
        self.shared.shutdown.store(true, Ordering::Release);

        let parked: Vec<queue::QueuedTask> = {
            let mut parked = self.shared.parked.lock();
            parked.drain(..).collect()
        };
        for entry in self.shared.queue.drain().into_iter().chain(parked) {
            let task_id = entry.task.id;
            self.shared.statuses.insert(task_id, TaskStatus::Cancelled);
            self.shared.tracker.task_dequeued();
            self.shared.tracker.task_cancelled_queued();
            self.shared.results.insert(
                task_id,
                TaskResult::cancelled(task_id, entry.task.assigned_agents.first().copied()),
            );
        }

        // Signal running tasks, then give workers a drain window.
        for cancel in self.shared.cancels.iter() {
            cancel.notify_one();
        }

        let mut handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock();
            workers.drain(..).collect()
        };
        let deadline = tokio::time::Instant::now() + drain;
        for handle in &mut handles {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut *handle).await.is_err() {
                warn!("worker did not drain in time; aborting");
                handle.abort();
            }
        }
    }
}
