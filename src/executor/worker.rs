//! Worker loop
//!
//! Each worker repeatedly: pops the next task (blocking with a short
//! timeout), gates on resource availability, executes the pluggable
//! strategy under the task's timeout, and records the result. Strategy
//! failures become failed results; nothing a task does crashes the loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::executor::metrics::FinishKind;
use crate::executor::queue::QueuedTask;
use crate::executor::Shared;
use crate::model::agent::AgentId;
use crate::model::result::{PerformanceMetrics, ResourceUsage, TaskResult};
use crate::model::task::{Task, TaskStatus, WorkloadClass};
use crate::resources::manager::ResourceConstraint;

/// How long a pop blocks before re-checking the shutdown flag
const POP_TIMEOUT: Duration = Duration::from_millis(200);

enum Outcome {
    Success(serde_json::Value),
    Failed(String),
    TimedOut,
    Cancelled,
}

pub(crate) async fn run_worker(shared: Arc<Shared>, worker_id: usize) {
    debug!(worker_id, "worker started");

    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        let Some(entry) = shared.queue.pop_wait(POP_TIMEOUT).await else {
            continue;
        };
        shared.tracker.task_dequeued();
        process(&shared, worker_id, entry).await;
    }

    debug!(worker_id, "worker stopped");
}

async fn process(shared: &Arc<Shared>, worker_id: usize, entry: QueuedTask) {
    let task = entry.task.clone();
    let task_id = task.id;

    // Cancelled while queued but after the pop raced ahead of `remove`.
    if shared
        .statuses
        .get(&task_id)
        .map(|s| *s == TaskStatus::Cancelled)
        .unwrap_or(false)
    {
        record(shared, TaskResult::cancelled(task_id, assigned_agent(&entry)), None);
        shared.tracker.task_cancelled_queued();
        return;
    }

    // Dependency gate: every dependency known to this executor must have
    // completed successfully before the task may start. Waiting tasks
    // are parked off-queue so a high-priority dependent cannot starve
    // the lower-priority work it depends on; any terminal result wakes
    // the parked set.
    match dependency_state(shared, &task) {
        DependencyState::Ready => {}
        DependencyState::Waiting => {
            trace!(task = %task_id, "dependencies incomplete; parking");
            shared.tracker.task_requeued();
            shared.parked.lock().push(entry);
            // A dependency may have reached a terminal state between
            // the check and the park; re-check so the entry is not
            // stranded.
            if !matches!(dependency_state(shared, &task), DependencyState::Waiting) {
                shared.wake_parked();
            }
            return;
        }
        DependencyState::Broken(dep) => {
            let result = TaskResult::failure(
                task_id,
                assigned_agent(&entry),
                format!("dependency {dep} did not complete"),
            );
            shared.statuses.insert(task_id, TaskStatus::Failed);
            shared.tracker.task_started(Duration::ZERO);
            shared.tracker.task_finished(FinishKind::Failed, Duration::ZERO);
            record(shared, result, Some(FinishKind::Failed));
            return;
        }
    }

    // Resource gate: on failure the task goes back at its original
    // priority instead of being dropped.
    let wait_budget = Duration::from_secs(shared.settings.resource_wait_secs);
    if !shared.resources.wait_for_resources(wait_budget).await {
        trace!(task = %task_id, "resources unavailable; re-queueing");
        shared.tracker.task_requeued();
        shared.queue.requeue(task, entry.retry_count);
        return;
    }

    let constraint = constraint_for(&entry);
    if !shared.resources.allocate(worker_id, constraint) {
        trace!(task = %task_id, "allocation rejected; re-queueing");
        shared.tracker.task_requeued();
        shared.queue.requeue(task, entry.retry_count);
        return;
    }

    let queue_wait = entry.enqueued_at.elapsed();
    shared.tracker.task_started(queue_wait);
    shared.statuses.insert(task_id, TaskStatus::Running);

    let agent_id = assigned_agent(&entry);
    if let (Some(agents), Some(agent_id)) = (&shared.agents, agent_id) {
        if let Some(mut agent) = agents.get_mut(&agent_id) {
            agent.assign_task(task_id);
        }
    }

    let cancel = shared
        .cancels
        .entry(task_id)
        .or_insert_with(|| Arc::new(Notify::new()))
        .clone();

    // CPU-bound tasks share a core-count semaphore so the pool does not
    // oversubscribe the machine; I/O-bound and lightweight tasks skip it.
    let _cpu_permit = if task.strategy.workload_class() == WorkloadClass::CpuBound {
        match shared.cpu_gate.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                // Gate closed only happens during shutdown.
                shared.resources.deallocate(worker_id);
                shared.tracker.task_retrying();
                shared.queue.requeue(task, entry.retry_count);
                return;
            }
        }
    } else {
        None
    };

    let started_wall = Utc::now();
    let started = Instant::now();
    let execution = shared.strategy.execute(task.clone());

    let outcome = tokio::select! {
        _ = cancel.notified() => Outcome::Cancelled,
        res = tokio::time::timeout(task.timeout, execution) => match res {
            Err(_) => Outcome::TimedOut,
            Ok(Ok(output)) => Outcome::Success(output),
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
        },
    };

    let elapsed = started.elapsed();
    shared.resources.deallocate(worker_id);
    shared.cancels.remove(&task_id);

    // Failed executions with retry budget left go back to the queue.
    if let Outcome::Failed(ref error) = outcome {
        if entry.retry_count < task.max_retries {
            debug!(
                task = %task_id,
                attempt = entry.retry_count + 1,
                error = %error,
                "execution failed; retrying"
            );
            release_agent(shared, agent_id, elapsed, false);
            shared.statuses.insert(task_id, TaskStatus::Pending);
            shared.tracker.task_retrying();
            shared.queue.requeue(task, entry.retry_count + 1);
            return;
        }
    }

    let (status, kind, mut result) = match outcome {
        Outcome::Success(output) => (
            TaskStatus::Completed,
            FinishKind::Completed,
            TaskResult::success(task_id, agent_id, output),
        ),
        Outcome::Failed(error) => {
            warn!(task = %task_id, error = %error, "task failed");
            (
                TaskStatus::Failed,
                FinishKind::Failed,
                TaskResult::failure(task_id, agent_id, error),
            )
        }
        Outcome::TimedOut => {
            warn!(task = %task_id, timeout_secs = task.timeout.as_secs_f64(), "task timed out");
            (
                TaskStatus::TimedOut,
                FinishKind::TimedOut,
                TaskResult::timeout(task_id, agent_id, task.timeout),
            )
        }
        Outcome::Cancelled => (
            TaskStatus::Cancelled,
            FinishKind::Cancelled,
            TaskResult::cancelled(task_id, agent_id),
        ),
    };

    let success = kind == FinishKind::Completed;
    release_agent(shared, agent_id, elapsed, success);
    shared.tracker.task_finished(kind, elapsed);

    let sample = shared.monitor.latest();
    shared.tracker.observe_usage(&sample);
    let snapshot = shared.tracker.snapshot(sample);

    result.started_at = started_wall;
    result.finished_at = Utc::now();
    result.performance = PerformanceMetrics {
        execution_time: elapsed,
        queue_time: queue_wait,
        throughput: snapshot.throughput,
        retry_count: entry.retry_count,
        coordination_overhead: Duration::ZERO,
        communication_latency: Duration::ZERO,
    };
    result.resources = ResourceUsage {
        cpu_percent: sample.cpu_percent,
        memory_mb: sample.memory_mb,
        peak_memory_mb: snapshot.peak_memory_mb,
        io_read_bytes: 0,
        io_write_bytes: 0,
    };

    shared.statuses.insert(task_id, status);
    record(shared, result, Some(kind));
}

enum DependencyState {
    Ready,
    Waiting,
    Broken(crate::model::task::TaskId),
}

fn dependency_state(shared: &Shared, task: &Task) -> DependencyState {
    for dep in &task.dependencies {
        // Dependencies the executor has never seen are treated as
        // satisfied externally.
        let Some(status) = shared.statuses.get(dep).map(|s| *s) else {
            continue;
        };
        match status {
            TaskStatus::Completed => {}
            TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::TimedOut => {
                return DependencyState::Broken(*dep);
            }
            TaskStatus::Pending | TaskStatus::Running => return DependencyState::Waiting,
        }
    }
    DependencyState::Ready
}

fn assigned_agent(entry: &QueuedTask) -> Option<AgentId> {
    entry.task.assigned_agents.first().copied()
}

fn constraint_for(entry: &QueuedTask) -> ResourceConstraint {
    let memory_mb = entry
        .task
        .parameters
        .get("memory_mb")
        .and_then(|v| v.as_f64())
        .unwrap_or(64.0);
    let cpu_percent = entry
        .task
        .parameters
        .get("cpu_percent")
        .and_then(|v| v.as_f64())
        .unwrap_or(5.0);
    ResourceConstraint {
        memory_mb,
        cpu_percent,
    }
}

fn release_agent(
    shared: &Shared,
    agent_id: Option<AgentId>,
    elapsed: Duration,
    success: bool,
) {
    if let (Some(agents), Some(agent_id)) = (&shared.agents, agent_id) {
        if let Some(mut agent) = agents.get_mut(&agent_id) {
            agent.release(elapsed.as_secs_f64(), success);
        }
    }
}

fn record(shared: &Shared, result: TaskResult, kind: Option<FinishKind>) {
    if let Some(FinishKind::Failed | FinishKind::TimedOut) = kind {
        if shared.settings.fail_fast {
            shared.fail_fast_tripped.store(true, Ordering::Release);
        }
    }
    shared.results.insert(result.task_id, result);
    // A terminal state may unblock parked dependents.
    shared.wake_parked();
}
