//! Bounded priority queue
//!
//! Orders entries by `(priority desc, sequence asc)`: strict priority
//! with FIFO tie-break among equal priorities. `submit` rejects when the
//! queue is at capacity; re-enqueues after a resource-gating failure
//! bypass the bound so gated tasks are never dropped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::model::task::{Task, TaskId};
use crate::utils::errors::{EngineError, Result};

/// A task waiting in the queue
#[derive(Debug)]
pub struct QueuedTask {
    pub task: Task,
    pub priority: u8,
    pub sequence: u64,
    pub enqueued_at: Instant,
    pub retry_count: u32,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (older).
        self.priority
            .cmp(&other.priority)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Bounded MPMC priority queue
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    capacity: usize,
    sequence: AtomicU64,
    notify: Notify,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity.min(1024))),
            capacity,
            sequence: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Enqueue a task at its priority. Fails when at capacity.
    pub fn push(&self, task: Task) -> Result<()> {
        {
            let mut heap = self.heap.lock();
            if heap.len() >= self.capacity {
                return Err(EngineError::QueueFull {
                    capacity: self.capacity,
                });
            }
            heap.push(self.entry(task, 0));
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Re-enqueue a previously popped task at its original priority,
    /// carrying its retry count. Bypasses the capacity bound: gated or
    /// retried tasks are never dropped.
    pub fn requeue(&self, task: Task, retry_count: u32) {
        {
            let mut heap = self.heap.lock();
            heap.push(self.entry(task, retry_count));
        }
        self.notify.notify_one();
    }

    fn entry(&self, task: Task, retry_count: u32) -> QueuedTask {
        QueuedTask {
            priority: task.priority,
            sequence: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
            enqueued_at: Instant::now(),
            retry_count,
            task,
        }
    }

    /// Pop the highest-priority entry without blocking.
    pub fn try_pop(&self) -> Option<QueuedTask> {
        self.heap.lock().pop()
    }

    /// Pop the highest-priority entry, waiting up to `timeout` for one
    /// to arrive.
    pub async fn pop_wait(&self, timeout: Duration) -> Option<QueuedTask> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(entry) = self.try_pop() {
                return Some(entry);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(remaining) => return None,
            }
        }
    }

    /// Remove a specific queued task (cancellation path).
    pub fn remove(&self, task_id: TaskId) -> Option<QueuedTask> {
        let mut heap = self.heap.lock();
        let mut removed = None;
        let entries: Vec<QueuedTask> = std::mem::take(&mut *heap).into_vec();
        let mut rest = BinaryHeap::with_capacity(entries.len());
        for entry in entries {
            if removed.is_none() && entry.task.id == task_id {
                removed = Some(entry);
            } else {
                rest.push(entry);
            }
        }
        *heap = rest;
        removed
    }

    /// Drain every queued entry (shutdown path).
    pub fn drain(&self) -> Vec<QueuedTask> {
        let mut heap = self.heap.lock();
        std::mem::take(&mut *heap).into_sorted_vec()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
