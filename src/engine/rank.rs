//! Component C — dynamic critical path (DCP): bottom-up memoized task rank
//! and per-level critical-path selection (spec §4.C).

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::comm::mean_execution_time;
use crate::model::graph::TaskGraph;
use crate::model::ids::TaskId;
use crate::model::vm::VmPool;

#[cfg(test)]
use crate::model::ids::{VmId, VmIndex};
#[cfg(test)]
use crate::model::task::Task;
#[cfg(test)]
use crate::model::vm::Vm;

/// `rank(t)` for every task, computed iteratively over reverse-topological
/// order (spec §9: avoid recursion to sidestep stack overflow on deep
/// chains). `comm_estimate` is the per-pass, assignment-free edge cost fed
/// in by the driver (spec §4.H).
pub fn compute_ranks(graph: &TaskGraph, vms: &VmPool, comm_estimate: &HashMap<(TaskId, TaskId), f64>) -> Result<HashMap<TaskId, f64>> {
    let mut rank = HashMap::with_capacity(graph.len());

    // Reverse-topological order: process exit tasks first, so that every
    // successor's rank is already memoized by the time a task is visited.
    let mut order = graph.topological_order();
    order.reverse();

    for task_id in order {
        let task = graph.get(task_id);
        let w = mean_execution_time(graph, vms, task_id).ok_or(Error::UnschedulableTask { task: task_id })?;

        let successor_term = task
            .successors
            .iter()
            .map(|&succ| {
                let comm = comm_estimate.get(&(task_id, succ)).copied().unwrap_or(0.0);
                comm + rank[&succ]
            })
            .fold(0.0_f64, f64::max);

        rank.insert(task_id, w + successor_term);
    }

    Ok(rank)
}

/// The critical path: one task per level, the highest-ranked one, ties
/// broken by smallest id (spec §4.C).
#[derive(Debug, Clone)]
pub struct CriticalPath {
    tasks: Vec<TaskId>,
}

impl CriticalPath {
    pub fn contains(&self, task: TaskId) -> bool {
        self.tasks.contains(&task)
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

pub fn critical_path(graph: &TaskGraph, rank: &HashMap<TaskId, f64>) -> CriticalPath {
    let tasks = graph
        .levels_of()
        .iter()
        .filter_map(|level_tasks| {
            level_tasks
                .iter()
                .copied()
                // `max_by` returns the *last* maximal element on ties, so to
                // break ties toward the smallest id we make the smaller id
                // compare as the greater element.
                .max_by(|&a, &b| rank[&a].total_cmp(&rank[&b]).then(b.value().cmp(&a.value())))
        })
        .collect();
    CriticalPath { tasks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_path_breaks_ties_toward_smallest_id() {
        let rank: HashMap<TaskId, f64> = [(TaskId::new(5), 1.0), (TaskId::new(2), 1.0), (TaskId::new(9), 1.0)].into_iter().collect();
        let levels = vec![vec![TaskId::new(2), TaskId::new(5), TaskId::new(9)]];

        let chosen = levels[0]
            .iter()
            .copied()
            .max_by(|&a, &b| rank[&a].total_cmp(&rank[&b]).then(b.value().cmp(&a.value())))
            .unwrap();

        assert_eq!(chosen, TaskId::new(2));
    }

    #[test]
    fn critical_path_picks_the_higher_rank_when_unambiguous() {
        let rank: HashMap<TaskId, f64> = [(TaskId::new(0), 3.0), (TaskId::new(1), 7.0)].into_iter().collect();
        let levels = vec![vec![TaskId::new(0), TaskId::new(1)]];

        let chosen = levels[0].iter().copied().max_by(|&a, &b| rank[&a].total_cmp(&rank[&b]).then(b.value().cmp(&a.value()))).unwrap();

        assert_eq!(chosen, TaskId::new(1));
    }

    #[test]
    fn rank_of_a_linear_chain_sums_tail_to_head() {
        // 0 -> 1 -> 2, single VM of capacity 1, so W(t) = size(t). With no
        // communication estimate, rank(t) = size(t) + max(rank(successors)).
        let tasks = vec![
            Task::new(TaskId::new(0), 3.0, vec![], vec![TaskId::new(1)]),
            Task::new(TaskId::new(1), 4.0, vec![TaskId::new(0)], vec![TaskId::new(2)]),
            Task::new(TaskId::new(2), 5.0, vec![TaskId::new(1)], vec![]),
        ];
        let graph = TaskGraph::new(tasks).unwrap();
        let vms = VmPool::new(vec![Vm::new(VmId::new(0), VmIndex::new(0), 1.0, HashMap::new())]).unwrap();

        let rank = compute_ranks(&graph, &vms, &HashMap::new()).unwrap();

        assert!((rank[&TaskId::new(2)] - 5.0).abs() < 1e-9);
        assert!((rank[&TaskId::new(1)] - 9.0).abs() < 1e-9);
        assert!((rank[&TaskId::new(0)] - 12.0).abs() < 1e-9);
    }
}
