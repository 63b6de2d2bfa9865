//! Work-stealing queues
//!
//! One crossbeam deque per agent with an explicit `steal_work` operation,
//! instead of a single global stealable list. The work-stealing pass
//! moves low-priority tasks from overloaded agents here; underloaded
//! agents pull with `steal_work`, trying victims in shuffled order, and
//! `drain` returns whatever nobody stole.

use std::collections::HashMap;

use crossbeam::deque::{Steal, Stealer, Worker};
use rand::seq::SliceRandom;
use tracing::trace;

use crate::model::agent::AgentId;
use crate::model::task::Task;

/// Multiple of the mean load at which an agent counts as overloaded
pub const OVERLOAD_FACTOR: f64 = 1.5;

/// Per-agent steal queues
///
/// Owned by a single scheduler invocation; pushes happen during
/// scheduling, steals afterwards, so the deques never see contention on
/// the owner side.
pub struct StealQueues {
    queues: HashMap<AgentId, Worker<Task>>,
    stealers: Vec<(AgentId, Stealer<Task>)>,
}

impl StealQueues {
    pub fn new(agents: impl IntoIterator<Item = AgentId>) -> Self {
        let mut queues = HashMap::new();
        let mut stealers = Vec::new();
        for id in agents {
            let worker = Worker::new_fifo();
            stealers.push((id, worker.stealer()));
            queues.insert(id, worker);
        }
        Self { queues, stealers }
    }

    /// Mark a task stealable on its currently assigned agent's queue.
    pub fn push(&self, victim: AgentId, task: Task) {
        if let Some(queue) = self.queues.get(&victim) {
            trace!(%victim, task = %task.id, "task marked stealable");
            queue.push(task);
        }
    }

    /// Pull one stealable task for an idle agent, trying other agents'
    /// queues in shuffled order. Returns the task and the victim it was
    /// taken from.
    pub fn steal_work(&self, idle_agent: AgentId) -> Option<(Task, AgentId)> {
        let mut order: Vec<usize> = (0..self.stealers.len())
            .filter(|&i| self.stealers[i].0 != idle_agent)
            .collect();
        order.shuffle(&mut rand::thread_rng());

        for i in order {
            let (victim, stealer) = &self.stealers[i];
            loop {
                match stealer.steal() {
                    Steal::Success(task) => {
                        trace!(thief = %idle_agent, %victim, task = %task.id, "task stolen");
                        return Some((task, *victim));
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    /// Empty every queue, yielding each remaining task with the agent
    /// it was taken from.
    pub fn drain(&self) -> Vec<(AgentId, Task)> {
        let mut leftovers = Vec::new();
        for (id, queue) in &self.queues {
            while let Some(task) = queue.pop() {
                leftovers.push((*id, task));
            }
        }
        leftovers
    }

    /// Total stealable tasks across all queues.
    pub fn len(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steal_from_victim() {
        let victim = AgentId::new();
        let thief = AgentId::new();
        let queues = StealQueues::new([victim, thief]);

        queues.push(victim, Task::new("stealable"));
        assert_eq!(queues.len(), 1);

        let (task, from) = queues.steal_work(thief).expect("task available");
        assert_eq!(task.objective, "stealable");
        assert_eq!(from, victim);
        assert!(queues.is_empty());
    }

    #[test]
    fn test_no_self_steal() {
        let agent = AgentId::new();
        let queues = StealQueues::new([agent]);
        queues.push(agent, Task::new("own task"));

        // The only queue belongs to the thief itself.
        assert!(queues.steal_work(agent).is_none());
        assert_eq!(queues.len(), 1);
    }

    #[test]
    fn test_drain_returns_leftovers_to_victims() {
        let a = AgentId::new();
        let b = AgentId::new();
        let queues = StealQueues::new([a, b]);
        queues.push(a, Task::new("left on a"));
        queues.push(b, Task::new("left on b"));

        let mut leftovers = queues.drain();
        leftovers.sort_by_key(|(_, task)| task.objective.clone());
        assert_eq!(leftovers.len(), 2);
        assert_eq!(leftovers[0].0, a);
        assert_eq!(leftovers[1].0, b);
        assert!(queues.is_empty());
    }

    #[test]
    fn test_steal_empty() {
        let queues = StealQueues::new([AgentId::new(), AgentId::new()]);
        assert!(queues.steal_work(AgentId::new()).is_none());
    }
}
