//! Dependency leveling
//!
//! Tasks are topologically leveled by dependency depth before any
//! assignment algorithm runs: a task's level is the longest dependency
//! chain beneath it within the batch. Dependencies pointing outside the
//! batch are treated as already satisfied. Cycles are detected with
//! Kahn's algorithm and rejected rather than silently collapsing to
//! level 0.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::task::{Task, TaskId};
use crate::utils::errors::{EngineError, Result};

/// Compute the dependency level of every task in the batch.
pub fn level_tasks(tasks: &[Task]) -> Result<HashMap<TaskId, usize>> {
    let in_batch: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();

    // dependents[d] = tasks that depend on d
    let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    let mut in_degree: HashMap<TaskId, usize> = HashMap::new();

    for task in tasks {
        let deps: Vec<TaskId> = task
            .dependencies
            .iter()
            .filter(|d| in_batch.contains(d))
            .copied()
            .collect();
        in_degree.insert(task.id, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(task.id);
        }
    }

    let mut levels: HashMap<TaskId, usize> = HashMap::new();
    let mut ready: VecDeque<TaskId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    for id in &ready {
        levels.insert(*id, 0);
    }

    let mut processed = 0;
    while let Some(id) = ready.pop_front() {
        processed += 1;
        let level = levels[&id];

        if let Some(children) = dependents.get(&id) {
            for child in children {
                let child_level = levels.entry(*child).or_insert(0);
                *child_level = (*child_level).max(level + 1);

                let degree = in_degree.get_mut(child).expect("child tracked in degree map");
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*child);
                }
            }
        }
    }

    if processed < tasks.len() {
        return Err(EngineError::DependencyCycle {
            count: tasks.len() - processed,
        });
    }

    Ok(levels)
}

/// Order tasks for scheduling: dependency level ascending (roots first),
/// then priority descending, then creation time ascending. Dependency
/// order is a tie-break, not a barrier; the executor refuses to start a
/// task whose dependencies are incomplete.
pub fn order_tasks(mut tasks: Vec<Task>) -> Result<Vec<Task>> {
    let levels = level_tasks(&tasks)?;
    tasks.sort_by(|a, b| {
        let la = levels.get(&a.id).copied().unwrap_or(0);
        let lb = levels.get(&b.id).copied().unwrap_or(0);
        la.cmp(&lb)
            .then(b.priority.cmp(&a.priority))
            .then(a.created_at.cmp(&b.created_at))
    });
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_chain() {
        let a = Task::new("a");
        let b = Task::new("b").with_dependency(a.id);
        let c = Task::new("c").with_dependency(b.id);

        let tasks = vec![c.clone(), a.clone(), b.clone()];
        let levels = level_tasks(&tasks).unwrap();

        assert_eq!(levels[&a.id], 0);
        assert_eq!(levels[&b.id], 1);
        assert_eq!(levels[&c.id], 2);
    }

    #[test]
    fn test_external_dependency_treated_satisfied() {
        let external = TaskId::new();
        let a = Task::new("a").with_dependency(external);
        let levels = level_tasks(&[a.clone()]).unwrap();
        assert_eq!(levels[&a.id], 0);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut a = Task::new("a");
        let mut b = Task::new("b");
        a.dependencies.insert(b.id);
        b.dependencies.insert(a.id);

        let err = level_tasks(&[a, b]).unwrap_err();
        assert!(matches!(err, EngineError::DependencyCycle { count: 2 }));
    }

    #[test]
    fn test_order_roots_first_then_priority() {
        let root_low = Task::new("root low").with_priority(1);
        let root_high = Task::new("root high").with_priority(9);
        let child = Task::new("child")
            .with_priority(10)
            .with_dependency(root_low.id);

        let ordered = order_tasks(vec![child.clone(), root_low.clone(), root_high.clone()])
            .unwrap();

        assert_eq!(ordered[0].id, root_high.id);
        assert_eq!(ordered[1].id, root_low.id);
        assert_eq!(ordered[2].id, child.id);
    }
}
