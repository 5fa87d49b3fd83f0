//! Component D — the stable-matching scheduler (SMGT, spec §4.D).
//!
//! Processes one topological level at a time: the critical-path task (if
//! any) goes straight to the largest free-capacity VM, then the remaining
//! tasks at that level are placed by a capacitated deferred-acceptance
//! (Gale-Shapley) stable match against per-VM thresholds, with a
//! minimum-load spill for any task that exhausts its preference list.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use crate::engine::rank::CriticalPath;
use crate::model::comm::{comm_time, CommCostTable};
use crate::model::graph::TaskGraph;
use crate::model::ids::{TaskId, VmIndex};
use crate::model::placement::{Placement, Schedule};
use crate::model::vm::{execution_time, VmPool};

/// Per-VM upper bound on how many of a level's tasks it may accept,
/// proportional to its share of total cluster capacity (spec §4.D step 2).
/// The minimum threshold is 1.
fn compute_thresholds(vms: &VmPool, level_task_count: usize) -> HashMap<VmIndex, usize> {
    let total_capacity = vms.total_capacity();
    vms.iter()
        .map(|vm| {
            let share = vm.processing_capacity / total_capacity * level_task_count as f64;
            let threshold = ((share - 1e-9).ceil()).max(1.0) as usize;
            (vm.index, threshold)
        })
        .collect()
}

fn choose_cp_vm(vms: &VmPool, thresholds: &HashMap<VmIndex, usize>, count: &HashMap<VmIndex, usize>) -> VmIndex {
    vms.indices()
        .filter(|vm| count[vm] < thresholds[vm])
        .max_by(|&a, &b| {
            vms.get(a)
                .processing_capacity
                .total_cmp(&vms.get(b).processing_capacity)
                // ties broken toward the smallest index: make the smaller
                // index compare as greater so `max_by` keeps it.
                .then(b.cmp(&a))
        })
        .expect("every VM has threshold >= 1, so at least one has spare capacity at the start of a level")
}

/// Ascending execution time, for VM preference's "good fit" ratio and for
/// excluding VMs a task cannot run on at all.
fn et_or_infinite(graph: &TaskGraph, vms: &VmPool, task: TaskId, vm: VmIndex) -> f64 {
    execution_time(graph.get(task).size, vms.get(vm)).unwrap_or(f64::INFINITY)
}

pub fn min_execution_time(graph: &TaskGraph, vms: &VmPool, task: TaskId) -> f64 {
    vms.indices().map(|vm| et_or_infinite(graph, vms, task, vm)).fold(f64::INFINITY, f64::min)
}

/// Expected communication penalty for placing `task` on `vm`: the sum of
/// communication costs from its already-placed predecessors (spec §4.D
/// step 3, task→VM preference component (b)). All predecessors are at
/// strictly earlier levels and therefore already placed.
fn comm_penalty(graph: &TaskGraph, vms: &VmPool, table: &CommCostTable, placement: &Placement, task: TaskId, vm: VmIndex) -> f64 {
    graph
        .get(task)
        .predecessors
        .iter()
        .map(|&pred| {
            let vm_pred = placement.vm_of(pred).expect("predecessors are placed before their successors' level is processed");
            comm_time(table, vms, pred, task, vm_pred, vm)
        })
        .sum()
}

/// Task→VM preference key (spec §4.D step 3(a)): ascending ET, ascending
/// communication penalty, ascending load-relative-to-threshold, with VM
/// index as the final deterministic tie-break.
fn task_preference_key(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    placement: &Placement,
    thresholds: &HashMap<VmIndex, usize>,
    count_at_level_start: &HashMap<VmIndex, usize>,
    task: TaskId,
    vm: VmIndex,
) -> (f64, f64, f64, usize) {
    let et = et_or_infinite(graph, vms, task, vm);
    let penalty = comm_penalty(graph, vms, table, placement, task, vm);
    let load_ratio = count_at_level_start[&vm] as f64 / thresholds[&vm] as f64;
    (et, penalty, load_ratio, vm.get())
}

/// VM→task preference ordering (spec §4.D step 3(b), exact tie-breaks):
/// ascending ET-ratio, descending rank, ascending task id.
fn compare_vm_preference(
    graph: &TaskGraph,
    vms: &VmPool,
    rank: &HashMap<TaskId, f64>,
    min_et: &HashMap<TaskId, f64>,
    vm: VmIndex,
    a: TaskId,
    b: TaskId,
) -> Ordering {
    let ratio_a = et_or_infinite(graph, vms, a, vm) / min_et[&a];
    let ratio_b = et_or_infinite(graph, vms, b, vm) / min_et[&b];
    ratio_a
        .total_cmp(&ratio_b)
        .then_with(|| rank[&b].total_cmp(&rank[&a]))
        .then_with(|| a.value().cmp(&b.value()))
}

/// Runs SMGT over every level of `graph` in ascending order, returning the
/// resulting placement and the nominal per-VM schedule (spec §4.D output:
/// "one ordered list per VM, level order, intra-level ascending id").
pub fn schedule_smgt(graph: &TaskGraph, vms: &VmPool, table: &CommCostTable, cp: &CriticalPath, rank: &HashMap<TaskId, f64>) -> Placement {
    let mut placement = Placement::new();
    let min_et: HashMap<TaskId, f64> = graph.tasks().map(|t| (t.id, min_execution_time(graph, vms, t.id))).collect();

    for level_tasks in graph.levels_of() {
        if level_tasks.is_empty() {
            continue;
        }
        let thresholds = compute_thresholds(vms, level_tasks.len());
        let mut count: HashMap<VmIndex, usize> = vms.indices().map(|vm| (vm, 0usize)).collect();

        let cp_task = level_tasks.iter().copied().find(|&t| cp.contains(t));
        if let Some(cp_task) = cp_task {
            let vm = choose_cp_vm(vms, &thresholds, &count);
            placement.set(cp_task, vm);
            *count.get_mut(&vm).unwrap() += 1;
        }

        let remaining: Vec<TaskId> = level_tasks.iter().copied().filter(|&t| Some(t) != cp_task).collect();
        if remaining.is_empty() {
            continue;
        }

        let capacity: HashMap<VmIndex, usize> = vms.indices().map(|vm| (vm, thresholds[&vm].saturating_sub(count[&vm]))).collect();

        // Task preference lists are built once, from the state right after
        // CP placement — deferred acceptance needs fixed preference lists.
        let preferences: HashMap<TaskId, Vec<VmIndex>> = remaining
            .iter()
            .map(|&task| {
                let mut vms_for_task: Vec<VmIndex> =
                    vms.indices().filter(|&vm| et_or_infinite(graph, vms, task, vm).is_finite()).collect();
                vms_for_task.sort_by(|&a, &b| {
                    task_preference_key(graph, vms, table, &placement, &thresholds, &count, task, a)
                        .partial_cmp(&task_preference_key(graph, vms, table, &placement, &thresholds, &count, task, b))
                        .unwrap()
                });
                (task, vms_for_task)
            })
            .collect();

        let assignment = deferred_acceptance(graph, vms, rank, &min_et, &remaining, &preferences, &capacity);

        // Spill: tasks that exhausted their preference list go to the VM
        // with minimum current load at this level (spec §4.D step 3, spill).
        let mut load: HashMap<VmIndex, usize> = count.clone();
        for &vm in assignment.values() {
            *load.get_mut(&vm).unwrap() += 1;
        }

        for &task in &remaining {
            let vm = match assignment.get(&task) {
                Some(&vm) => vm,
                None => {
                    let vm = *load.iter().min_by_key(|(vm, &l)| (l, vm.get())).map(|(vm, _)| vm).expect("pool is non-empty");
                    *load.get_mut(&vm).unwrap() += 1;
                    log::warn!("SMGT spill: task {task} exhausted its VM preference list, assigned to least-loaded VM {vm}");
                    vm
                }
            };
            placement.set(task, vm);
        }
    }

    placement
}

/// Capacitated deferred acceptance: every unassigned task proposes down its
/// preference list until it is tentatively held or runs out of VMs to try.
fn deferred_acceptance(
    graph: &TaskGraph,
    vms: &VmPool,
    rank: &HashMap<TaskId, f64>,
    min_et: &HashMap<TaskId, f64>,
    remaining: &[TaskId],
    preferences: &HashMap<TaskId, Vec<VmIndex>>,
    capacity: &HashMap<VmIndex, usize>,
) -> HashMap<TaskId, VmIndex> {
    let mut next_index: HashMap<TaskId, usize> = remaining.iter().map(|&t| (t, 0)).collect();
    let mut held: HashMap<VmIndex, Vec<TaskId>> = vms.indices().map(|vm| (vm, Vec::new())).collect();
    let mut free: VecDeque<TaskId> = remaining.iter().copied().collect();

    while let Some(task) = free.pop_front() {
        let index = next_index[&task];
        let Some(&vm) = preferences[&task].get(index) else {
            continue; // exhausted; left unassigned for the spill pass
        };
        next_index.insert(task, index + 1);

        let bucket = held.get_mut(&vm).unwrap();
        bucket.push(task);
        let cap = capacity[&vm];
        if bucket.len() > cap {
            bucket.sort_by(|&a, &b| compare_vm_preference(graph, vms, rank, min_et, vm, a, b));
            for rejected in bucket.split_off(cap) {
                free.push_back(rejected);
            }
        }
    }

    held.into_iter().flat_map(|(vm, tasks)| tasks.into_iter().map(move |t| (t, vm))).collect()
}

/// Materializes the final, ordered per-VM schedule from a completed
/// placement: level order, ascending task id within a level.
pub fn build_schedule(graph: &TaskGraph, vms: &VmPool, placement: &Placement) -> Schedule {
    let mut schedule: Schedule = vms.indices().map(|vm| (vm, Vec::new())).collect();
    for level_tasks in graph.levels_of() {
        for &task in level_tasks {
            let vm = placement.vm_of(task).expect("SMGT assigns every task");
            schedule.get_mut(&vm).unwrap().push(task);
        }
    }
    schedule
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use super::*;
    use crate::model::ids::VmId;

    fn pool(capacities: &[f64]) -> VmPool {
        let vms = capacities
            .iter()
            .enumerate()
            .map(|(i, &cap)| {
                let bandwidth = (0..capacities.len())
                    .filter(|&j| j != i)
                    .map(|j| (VmId::new(j as u64), 25.0))
                    .collect::<StdHashMap<_, _>>();
                crate::model::vm::Vm::new(VmId::new(i as u64), VmIndex::new(i), cap, bandwidth)
            })
            .collect();
        VmPool::new(vms).unwrap()
    }

    #[test]
    fn equal_capacity_vms_split_a_ten_task_level_evenly() {
        // Spec §8 scenario 4: 10 tasks, two equal-capacity VMs -> threshold
        // ceil(10 * 0.5) = 5 for each.
        let vms = pool(&[1.0, 1.0]);
        let thresholds = compute_thresholds(&vms, 10);
        assert_eq!(thresholds[&VmIndex::new(0)], 5);
        assert_eq!(thresholds[&VmIndex::new(1)], 5);
    }

    #[test]
    fn every_vm_gets_at_least_threshold_one() {
        // A VM with a negligible capacity share must still be able to take
        // at least one task from a non-empty level.
        let vms = pool(&[100.0, 0.01]);
        let thresholds = compute_thresholds(&vms, 3);
        assert!(thresholds[&VmIndex::new(1)] >= 1);
    }

    #[test]
    fn choose_cp_vm_prefers_largest_free_capacity_then_smallest_index() {
        let vms = pool(&[2.0, 2.0, 1.0]);
        let thresholds: StdHashMap<VmIndex, usize> = [(VmIndex::new(0), 1), (VmIndex::new(1), 1), (VmIndex::new(2), 1)].into_iter().collect();
        let count: StdHashMap<VmIndex, usize> = [(VmIndex::new(0), 0), (VmIndex::new(1), 0), (VmIndex::new(2), 0)].into_iter().collect();

        // Two VMs tie on capacity (2.0); the smaller index wins.
        assert_eq!(choose_cp_vm(&vms, &thresholds, &count), VmIndex::new(0));
    }
}
