//! Component G — schedule-quality metrics (spec §4.G): SLR, per-VM and
//! average utilization, and the fairness variance VF, all derived from a
//! completed placement and timing table.

use std::collections::HashMap;

use crate::engine::matching::min_execution_time;
use crate::engine::rank::CriticalPath;
use crate::engine::timing::Timings;
use crate::model::graph::TaskGraph;
use crate::model::ids::VmIndex;
use crate::model::placement::Placement;
use crate::model::vm::{execution_time, VmPool};

/// Schedule-quality metrics for one completed run (spec §3 output bundle).
#[derive(Debug, Clone)]
pub struct Metrics {
    pub makespan: f64,
    pub slr: f64,
    pub avu: f64,
    pub vu: HashMap<VmIndex, f64>,
    pub vf: f64,
    pub duplication_count: usize,
}

/// Schedule Length Ratio: makespan over the sum of each critical-path task's
/// fastest possible execution time (spec §4.G). A task on the critical path
/// that is unschedulable everywhere is a driver-level fatal error, not a
/// metrics concern — by the time this runs, every task has already been
/// placed successfully.
fn compute_slr(graph: &TaskGraph, vms: &VmPool, cp: &CriticalPath, makespan: f64) -> f64 {
    let lower_bound: f64 = cp.tasks().iter().map(|&t| min_execution_time(graph, vms, t)).sum();
    makespan / lower_bound
}

/// Per-VM utilization: total execution time it spends on work — original
/// tasks and LOTD duplicates alike — divided by the makespan (spec §4.G).
fn compute_utilization(graph: &TaskGraph, vms: &VmPool, placement: &Placement, timings: &Timings, makespan: f64) -> HashMap<VmIndex, f64> {
    let mut busy: HashMap<VmIndex, f64> = vms.indices().map(|vm| (vm, 0.0)).collect();

    for task in graph.tasks() {
        let vm = placement.vm_of(task.id).expect("every task is placed");
        let et = execution_time(task.size, vms.get(vm)).unwrap_or(0.0);
        *busy.get_mut(&vm).unwrap() += et;
    }
    for (task, vm, _ast, _aft) in timings.duplicates() {
        let et = execution_time(graph.get(task).size, vms.get(vm)).unwrap_or(0.0);
        *busy.get_mut(&vm).unwrap() += et;
    }

    if makespan <= 0.0 {
        return busy.into_iter().map(|(vm, _)| (vm, 0.0)).collect();
    }
    busy.into_iter().map(|(vm, time)| (vm, time / makespan)).collect()
}

/// Population variance of each assigned task's satisfaction ratio
/// `ET(t, vm_of(t)) / min_v ET(t, v)` (spec §4.G, §9: `actual/fastest`
/// convention). Tasks with a non-finite numerator or denominator — none
/// should occur once placement succeeds — are excluded defensively.
fn compute_vf(graph: &TaskGraph, vms: &VmPool, placement: &Placement) -> f64 {
    let ratios: Vec<f64> = graph
        .tasks()
        .filter_map(|task| {
            let vm = placement.vm_of(task.id)?;
            let actual = execution_time(task.size, vms.get(vm))?;
            let fastest = min_execution_time(graph, vms, task.id);
            let ratio = actual / fastest;
            ratio.is_finite().then_some(ratio)
        })
        .collect();

    if ratios.is_empty() {
        return 0.0;
    }
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / ratios.len() as f64
}

/// Computes every metric in the output bundle from a completed pass (spec
/// §4.H final step).
pub fn compute(
    graph: &TaskGraph,
    vms: &VmPool,
    placement: &Placement,
    timings: &Timings,
    cp: &CriticalPath,
    duplication_count: usize,
) -> Metrics {
    let makespan = timings.makespan();
    let slr = compute_slr(graph, vms, cp, makespan);
    let vu = compute_utilization(graph, vms, placement, timings, makespan);
    let avu = vu.values().sum::<f64>() / vu.len().max(1) as f64;
    let vf = compute_vf(graph, vms, placement);

    Metrics { makespan, slr, avu, vu, vf, duplication_count }
}
