//! End-to-end invariant tests for the two-pass driver (spec §8).

use std::collections::HashMap;

use sm_cptd_scheduler::engine::driver;
use sm_cptd_scheduler::model::comm::CommCostTable;
use sm_cptd_scheduler::model::graph::TaskGraph;
use sm_cptd_scheduler::model::ids::{TaskId, VmId, VmIndex};
use sm_cptd_scheduler::model::task::Task;
use sm_cptd_scheduler::model::vm::{Vm, VmPool};

fn fully_connected_pool(capacities: &[f64], bandwidth: f64) -> VmPool {
    let vms = capacities
        .iter()
        .enumerate()
        .map(|(i, &cap)| {
            let peers = (0..capacities.len()).filter(|&j| j != i).map(|j| (VmId::new(j as u64), bandwidth)).collect::<HashMap<_, _>>();
            Vm::new(VmId::new(i as u64), VmIndex::new(i), cap, peers)
        })
        .collect();
    VmPool::new(vms).unwrap()
}

/// Single task, single VM (spec §8 "boundary cases"): the critical path is
/// just that task, and since there is no alternative VM the schedule is
/// already optimal, so SLR is exactly 1.
#[test]
fn single_task_single_vm_has_slr_one() {
    let graph = TaskGraph::new(vec![Task::new(TaskId::new(0), 10.0, vec![], vec![])]).unwrap();
    let vms = fully_connected_pool(&[2.0], 25.0);
    let table = CommCostTable::new(HashMap::new(), 25.0);

    let output = driver::run(&graph, &vms, &table).unwrap();

    assert_eq!(output.critical_path.tasks(), &[TaskId::new(0)]);
    assert!((output.metrics.makespan - 5.0).abs() < 1e-9);
    assert!((output.metrics.slr - 1.0).abs() < 1e-6);
    assert!((output.metrics.avu - 1.0).abs() < 1e-6);
    assert!(output.metrics.vf.abs() < 1e-9);
}

/// A linear chain on a single VM (spec §8 "boundary cases"): every task ends
/// up on the only VM, in order, with zero communication cost, so the
/// makespan is exactly the sum of execution times and the whole chain is
/// the critical path.
#[test]
fn linear_chain_single_vm_makespan_is_sum_of_execution_times() {
    let tasks = vec![
        Task::new(TaskId::new(0), 4.0, vec![], vec![TaskId::new(1)]),
        Task::new(TaskId::new(1), 6.0, vec![TaskId::new(0)], vec![TaskId::new(2)]),
        Task::new(TaskId::new(2), 2.0, vec![TaskId::new(1)], vec![]),
    ];
    let graph = TaskGraph::new(tasks).unwrap();
    let vms = fully_connected_pool(&[1.0], 25.0);
    let table = CommCostTable::new(HashMap::new(), 25.0);

    let output = driver::run(&graph, &vms, &table).unwrap();

    assert_eq!(output.critical_path.len(), 3);
    assert!((output.metrics.makespan - 12.0).abs() < 1e-9);
    assert_eq!(output.schedule[&VmIndex::new(0)].len(), 3);
}

/// Independent entry-and-exit tasks on a single VM (spec §8 "fully
/// parallel"): with only one VM every task still lands there and runs
/// strictly sequentially, since nothing can overlap on one machine.
#[test]
fn fully_parallel_tasks_on_one_vm_run_sequentially() {
    let tasks = (0..4).map(|id| Task::new(TaskId::new(id), 3.0, vec![], vec![])).collect();
    let graph = TaskGraph::new(tasks).unwrap();
    let vms = fully_connected_pool(&[1.0], 25.0);
    let table = CommCostTable::new(HashMap::new(), 25.0);

    let output = driver::run(&graph, &vms, &table).unwrap();

    assert_eq!(output.placement.len(), 4);
    assert!((output.metrics.makespan - 12.0).abs() < 1e-9);
    timeline_has_no_overlap(&output);
}

/// Same DAG, same inputs, two independent runs: the engine has no
/// randomness, so a rerun must reproduce the exact same schedule and
/// metrics (spec §8 "deterministic rerun").
#[test]
fn identical_inputs_produce_identical_output() {
    let tasks = vec![
        Task::new(TaskId::new(0), 10.0, vec![], vec![TaskId::new(1), TaskId::new(2)]),
        Task::new(TaskId::new(1), 10.0, vec![TaskId::new(0)], vec![TaskId::new(3)]),
        Task::new(TaskId::new(2), 10.0, vec![TaskId::new(0)], vec![TaskId::new(3)]),
        Task::new(TaskId::new(3), 10.0, vec![TaskId::new(1), TaskId::new(2)], vec![]),
    ];
    let vms = fully_connected_pool(&[2.0, 1.0], 25.0);
    let mut costs = HashMap::new();
    costs.insert((TaskId::new(0), TaskId::new(1)), 5.0);
    costs.insert((TaskId::new(0), TaskId::new(2)), 5.0);
    costs.insert((TaskId::new(1), TaskId::new(3)), 5.0);
    costs.insert((TaskId::new(2), TaskId::new(3)), 5.0);
    let table = CommCostTable::new(costs, 25.0);

    let graph_a = TaskGraph::new(tasks.clone()).unwrap();
    let output_a = driver::run(&graph_a, &vms, &table).unwrap();
    let graph_b = TaskGraph::new(tasks).unwrap();
    let output_b = driver::run(&graph_b, &vms, &table).unwrap();

    assert_eq!(output_a.schedule, output_b.schedule);
    assert!((output_a.metrics.makespan - output_b.metrics.makespan).abs() < 1e-12);
    assert!((output_a.metrics.slr - output_b.metrics.slr).abs() < 1e-12);
    assert!((output_a.metrics.vf - output_b.metrics.vf).abs() < 1e-12);
}

/// Every produced schedule must satisfy the universal invariants from spec
/// §8 regardless of the specific DAG: no two slots on a VM overlap.
#[test]
fn diamond_schedule_has_no_overlaps_and_valid_metrics() {
    let tasks = vec![
        Task::new(TaskId::new(0), 10.0, vec![], vec![TaskId::new(1), TaskId::new(2)]),
        Task::new(TaskId::new(1), 10.0, vec![TaskId::new(0)], vec![TaskId::new(3)]),
        Task::new(TaskId::new(2), 10.0, vec![TaskId::new(0)], vec![TaskId::new(3)]),
        Task::new(TaskId::new(3), 10.0, vec![TaskId::new(1), TaskId::new(2)], vec![]),
    ];
    let graph = TaskGraph::new(tasks).unwrap();
    let vms = fully_connected_pool(&[2.0, 1.0], 25.0);
    let table = CommCostTable::new(HashMap::new(), 25.0);

    let output = driver::run(&graph, &vms, &table).unwrap();

    assert_eq!(output.critical_path.len(), 3);
    assert!(output.metrics.slr >= 1.0 - 1e-6);
    assert!(output.metrics.avu >= 0.0 && output.metrics.avu <= 1.0 + 1e-9);
    assert!(output.metrics.vf >= 0.0);
    timeline_has_no_overlap(&output);
}

/// Extreme CCR (spec §8 scenario 5): the same DAG and VM pool scheduled
/// once with a zero communication-cost table (CCR=0) and once with costs
/// scaled up by a factor of 10 (CCR=10) must produce a critical path of the
/// same length, and SLR must not decrease as communication cost grows.
#[test]
fn extreme_ccr_keeps_critical_path_size_and_does_not_lower_slr() {
    let tasks = vec![
        Task::new(TaskId::new(0), 10.0, vec![], vec![TaskId::new(1), TaskId::new(2)]),
        Task::new(TaskId::new(1), 10.0, vec![TaskId::new(0)], vec![TaskId::new(3)]),
        Task::new(TaskId::new(2), 10.0, vec![TaskId::new(0)], vec![TaskId::new(3)]),
        Task::new(TaskId::new(3), 10.0, vec![TaskId::new(1), TaskId::new(2)], vec![]),
    ];
    let vms = fully_connected_pool(&[2.0, 1.0], 25.0);

    let base_costs = |scale: f64| -> HashMap<(TaskId, TaskId), f64> {
        [
            ((TaskId::new(0), TaskId::new(1)), 5.0 * scale),
            ((TaskId::new(0), TaskId::new(2)), 5.0 * scale),
            ((TaskId::new(1), TaskId::new(3)), 5.0 * scale),
            ((TaskId::new(2), TaskId::new(3)), 5.0 * scale),
        ]
        .into_iter()
        .collect()
    };

    let graph_ccr0 = TaskGraph::new(tasks.clone()).unwrap();
    let table_ccr0 = CommCostTable::new(base_costs(0.0), 25.0);
    let output_ccr0 = driver::run(&graph_ccr0, &vms, &table_ccr0).unwrap();

    let graph_ccr10 = TaskGraph::new(tasks).unwrap();
    let table_ccr10 = CommCostTable::new(base_costs(10.0), 25.0);
    let output_ccr10 = driver::run(&graph_ccr10, &vms, &table_ccr10).unwrap();

    assert_eq!(output_ccr0.critical_path.len(), output_ccr10.critical_path.len());
    assert!(output_ccr10.metrics.slr >= output_ccr0.metrics.slr - 1e-9);
}

fn timeline_has_no_overlap(output: &driver::EngineOutput) {
    for (&vm, tasks) in &output.schedule {
        let mut intervals: Vec<(f64, f64)> = tasks
            .iter()
            .map(|&task| match output.timings.dup_ast(task, vm) {
                Some(ast) => (ast, output.timings.dup_aft(task, vm).unwrap()),
                None => (output.timings.ast(task), output.timings.aft(task)),
            })
            .collect();
        intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0 + 1e-9, "overlap on VM {vm}: {:?}", pair);
        }
    }
}
