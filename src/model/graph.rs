use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::model::ids::TaskId;
use crate::model::task::Task;

/// The immutable task DAG (spec §3, §4.A).
///
/// Built once from an input task list; topological levels are computed at
/// construction time (Kahn-style propagation) and never recomputed.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index_of: HashMap<TaskId, usize>,
    levels: Vec<u32>,
    by_level: Vec<Vec<TaskId>>,
}

impl TaskGraph {
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        let mut index_of = HashMap::with_capacity(tasks.len());
        for (position, task) in tasks.iter().enumerate() {
            if index_of.insert(task.id, position).is_some() {
                return Err(Error::InvalidGraph { reason: format!("duplicate task id {}", task.id) });
            }
        }

        for task in &tasks {
            for &succ in &task.successors {
                let Some(&succ_pos) = index_of.get(&succ) else {
                    return Err(Error::InvalidGraph { reason: format!("task {} lists unknown successor {succ}", task.id) });
                };
                if !tasks[succ_pos].predecessors.contains(&task.id) {
                    return Err(Error::InvalidGraph {
                        reason: format!("edge {} -> {succ} is not mirrored in {succ}'s predecessor list", task.id),
                    });
                }
            }
            for &pred in &task.predecessors {
                let Some(&pred_pos) = index_of.get(&pred) else {
                    return Err(Error::InvalidGraph { reason: format!("task {} lists unknown predecessor {pred}", task.id) });
                };
                if !tasks[pred_pos].successors.contains(&task.id) {
                    return Err(Error::InvalidGraph {
                        reason: format!("edge {pred} -> {} is not mirrored in {pred}'s successor list", task.id),
                    });
                }
            }
        }

        let levels = compute_levels(&tasks, &index_of)?;

        let max_level = levels.iter().copied().max().unwrap_or(0);
        let mut by_level: Vec<Vec<TaskId>> = vec![Vec::new(); (max_level + 1) as usize];
        for (position, task) in tasks.iter().enumerate() {
            by_level[levels[position] as usize].push(task.id);
        }
        for level_tasks in &mut by_level {
            level_tasks.sort_by_key(|id| id.value());
        }

        Ok(Self { tasks, index_of, levels, by_level })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> &Task {
        &self.tasks[self.index_of[&id]]
    }

    pub fn level_of(&self, id: TaskId) -> u32 {
        self.levels[self.index_of[&id]]
    }

    pub fn num_levels(&self) -> u32 {
        self.by_level.len() as u32
    }

    /// Levels in ascending order, each an ascending-by-id task list.
    pub fn levels_of(&self) -> &[Vec<TaskId>] {
        &self.by_level
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Tasks in ascending-id order, for deterministic iteration.
    pub fn task_ids_sorted(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.iter().map(|t| t.id).collect();
        ids.sort_by_key(|id| id.value());
        ids
    }

    pub fn entry_tasks(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.iter().filter(|t| t.is_entry()).map(|t| t.id).collect();
        ids.sort_by_key(|id| id.value());
        ids
    }

    pub fn exit_tasks(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.tasks.iter().filter(|t| t.is_exit()).map(|t| t.id).collect();
        ids.sort_by_key(|id| id.value());
        ids
    }

    /// The canonical exit task: among tasks with no successors, the one
    /// with the maximum id (spec §4.A tie-break).
    pub fn exit_task_canonical(&self) -> Result<TaskId> {
        self.exit_tasks()
            .into_iter()
            .max_by_key(|id| id.value())
            .ok_or_else(|| Error::NoExitTask { reason: "graph has no task with an empty successor set".to_string() })
    }

    /// Topological order (Kahn), ascending by id among ties, used by the
    /// timing engine (spec §4.F step 1).
    pub fn topological_order(&self) -> Vec<TaskId> {
        topological_order(&self.tasks, &self.index_of)
    }
}

fn compute_levels(tasks: &[Task], index_of: &HashMap<TaskId, usize>) -> Result<Vec<u32>> {
    let n = tasks.len();
    let mut indegree = vec![0u32; n];
    for task in tasks {
        indegree[index_of[&task.id]] = task.predecessors.len() as u32;
    }

    let mut levels = vec![0u32; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut remaining = indegree.clone();
    let mut visited = 0usize;

    while let Some(position) = queue.pop_front() {
        visited += 1;
        let task = &tasks[position];
        for &succ in &task.successors {
            let succ_pos = index_of[&succ];
            levels[succ_pos] = levels[succ_pos].max(levels[position] + 1);
            remaining[succ_pos] -= 1;
            if remaining[succ_pos] == 0 {
                queue.push_back(succ_pos);
            }
        }
    }

    if visited != n {
        return Err(Error::InvalidGraph { reason: "cycle detected while computing topological levels".to_string() });
    }

    Ok(levels)
}

fn topological_order(tasks: &[Task], index_of: &HashMap<TaskId, usize>) -> Vec<TaskId> {
    let n = tasks.len();
    let mut indegree = vec![0u32; n];
    for task in tasks {
        indegree[index_of[&task.id]] = task.predecessors.len() as u32;
    }

    // Ready set is kept sorted by id for deterministic tie-breaks (spec §9).
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    ready.sort_by_key(|&i| tasks[i].id.value());

    let mut order = Vec::with_capacity(n);
    let mut ready_deque: VecDeque<usize> = ready.into();

    while let Some(position) = pop_min_ready(&mut ready_deque, tasks) {
        order.push(tasks[position].id);
        for &succ in &tasks[position].successors {
            let succ_pos = index_of[&succ];
            indegree[succ_pos] -= 1;
            if indegree[succ_pos] == 0 {
                ready_deque.push_back(succ_pos);
            }
        }
    }

    order
}

fn pop_min_ready(ready: &mut VecDeque<usize>, tasks: &[Task]) -> Option<usize> {
    if ready.is_empty() {
        return None;
    }
    let (min_slot, _) = ready.iter().enumerate().min_by_key(|(_, &pos)| tasks[pos].id.value())?;
    ready.remove(min_slot)
}
