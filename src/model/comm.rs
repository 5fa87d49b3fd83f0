use std::collections::HashMap;

use crate::model::graph::TaskGraph;
use crate::model::ids::TaskId;
use crate::model::placement::Placement;
use crate::model::vm::VmPool;

/// The input communication-cost table (spec §3, §6): a normalized cost per
/// DAG edge `(u, v)`, expressed at the canonical average bandwidth `B̄`.
/// Immutable once ingested.
#[derive(Debug, Clone)]
pub struct CommCostTable {
    costs: HashMap<(TaskId, TaskId), f64>,
    b_bar: f64,
}

impl CommCostTable {
    pub fn new(costs: HashMap<(TaskId, TaskId), f64>, b_bar: f64) -> Self {
        Self { costs, b_bar }
    }

    pub fn b_bar(&self) -> f64 {
        self.b_bar
    }

    pub fn normalized(&self, u: TaskId, v: TaskId) -> f64 {
        self.costs.get(&(u, v)).copied().unwrap_or(0.0)
    }

    pub fn edges(&self) -> impl Iterator<Item = (TaskId, TaskId, f64)> + '_ {
        self.costs.iter().map(|(&(u, v), &c)| (u, v, c))
    }
}

/// Concrete communication time for edge `(u, v)` between the VMs hosting
/// them (spec §4.B): zero on the same VM, otherwise the normalized cost
/// rescaled from `B̄` to the actual pairwise bandwidth.
pub fn comm_time(table: &CommCostTable, vms: &VmPool, u: TaskId, v: TaskId, vm_u: crate::model::ids::VmIndex, vm_v: crate::model::ids::VmIndex) -> f64 {
    if vm_u == vm_v {
        return 0.0;
    }
    let bandwidth = vms.bandwidth_between(vm_u, vm_v).expect("VmPool guarantees a complete bandwidth matrix");
    table.normalized(u, v) * table.b_bar() / bandwidth
}

/// Per-edge communication estimate used to feed rank computation (component
/// C) before any VM assignment exists. Pass 1 (spec §4.C "DCP-formula
/// mode"): the average of the concrete formula over every ordered VM pair
/// `(k, l)`, `k != l`.
///
/// With fewer than two VMs there are no ordered pairs to average over; the
/// estimate is zero for every edge (no cross-VM communication is possible).
pub fn rank_comm_estimate_pass1(table: &CommCostTable, vms: &VmPool) -> HashMap<(TaskId, TaskId), f64> {
    let indices: Vec<_> = vms.indices().collect();
    let pair_count = indices.len().saturating_sub(1) * indices.len();

    table
        .edges()
        .map(|(u, v, normalized)| {
            if pair_count == 0 {
                return ((u, v), 0.0);
            }
            let sum: f64 = indices
                .iter()
                .flat_map(|&k| indices.iter().map(move |&l| (k, l)))
                .filter(|&(k, l)| k != l)
                .map(|(k, l)| {
                    let bandwidth = vms.bandwidth_between(k, l).expect("VmPool guarantees a complete bandwidth matrix");
                    normalized * table.b_bar() / bandwidth
                })
                .sum();
            ((u, v), sum / pair_count as f64)
        })
        .collect()
}

/// Pass 2 (spec §4.H): recompute the per-edge rank estimate using the prior
/// pass's placement. Same-VM edges cost zero; cross-VM edges use the real
/// pairwise bandwidth; an edge whose endpoint was not placed in the prior
/// pass (should not happen once a pass completes) falls back to the
/// pass-1 average for that edge.
pub fn rank_comm_estimate_pass2(table: &CommCostTable, vms: &VmPool, placement: &Placement) -> HashMap<(TaskId, TaskId), f64> {
    let fallback = rank_comm_estimate_pass1(table, vms);

    table
        .edges()
        .map(|(u, v, _normalized)| {
            let estimate = match (placement.vm_of(u), placement.vm_of(v)) {
                (Some(vm_u), Some(vm_v)) => comm_time(table, vms, u, v, vm_u, vm_v),
                _ => fallback.get(&(u, v)).copied().unwrap_or(0.0),
            };
            ((u, v), estimate)
        })
        .collect()
}

/// Mean execution time of `task` over every VM on which it is schedulable
/// (spec §4.C, base case `W(t)`). `None` if the task is unschedulable
/// everywhere — a fatal condition the caller should surface as
/// [`crate::error::Error::UnschedulableTask`].
pub fn mean_execution_time(graph: &TaskGraph, vms: &VmPool, task: TaskId) -> Option<f64> {
    let size = graph.get(task).size;
    let mut sum = 0.0;
    let mut count = 0usize;
    for vm in vms.iter() {
        if let Some(et) = crate::model::vm::execution_time(size, vm) {
            sum += et;
            count += 1;
        }
    }
    if count == 0 { None } else { Some(sum / count as f64) }
}
