//! Wire-format DTOs for the engine's input and output bundles (spec §6).
//! Deserialized directly from the scenario JSON ingested by the loader;
//! converted into the internal `model` types by [`crate::api::build_scenario`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::driver::EngineOutput;
use crate::model::comm::CommCostTable;
use crate::model::graph::TaskGraph;
use crate::model::ids::{TaskId, VmId, VmIndex};
use crate::model::task::Task;
use crate::model::vm::{Vm, VmPool};

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDto {
    pub id: u64,
    pub size: f64,
    pub predecessors: Vec<u64>,
    pub successors: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmDto {
    pub id: u64,
    pub index: usize,
    pub processing_capacity: f64,
    pub bandwidth: HashMap<u64, f64>,
}

/// The scenario file's top-level shape: a task list, a VM list, the CCR the
/// ingestion collaborator applied, and the normalized communication-cost
/// table keyed by ordered edge (spec §6 "Input bundle").
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioDto {
    pub tasks: Vec<TaskDto>,
    pub vms: Vec<VmDto>,
    pub ccr: f64,
    pub comm_costs: Vec<CommCostEntryDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommCostEntryDto {
    pub src: u64,
    pub dst: u64,
    pub cost: f64,
}

/// Converts the raw DTOs into the engine's internal model, failing with
/// [`crate::error::Error::InvalidGraph`] (via [`TaskGraph::new`]) or
/// [`crate::error::Error::InvalidCapacity`]/[`crate::error::Error::MissingBandwidth`]
/// (via [`VmPool::new`]) on malformed input.
pub fn build_scenario(dto: &ScenarioDto) -> crate::error::Result<(TaskGraph, VmPool, CommCostTable)> {
    let tasks = dto
        .tasks
        .iter()
        .map(|t| {
            Task::new(
                TaskId::new(t.id),
                t.size,
                t.predecessors.iter().map(|&id| TaskId::new(id)).collect(),
                t.successors.iter().map(|&id| TaskId::new(id)).collect(),
            )
        })
        .collect();
    let graph = TaskGraph::new(tasks)?;

    let vms = dto
        .vms
        .iter()
        .map(|v| {
            let bandwidth = v.bandwidth.iter().map(|(&peer, &bw)| (VmId::new(peer), bw)).collect();
            Vm::new(VmId::new(v.id), VmIndex::new(v.index), v.processing_capacity, bandwidth)
        })
        .collect();
    let pool = VmPool::new(vms)?;

    let costs = dto.comm_costs.iter().map(|e| ((TaskId::new(e.src), TaskId::new(e.dst)), e.cost)).collect();
    let table = CommCostTable::new(costs, crate::engine::config::B_BAR);

    Ok((graph, pool, table))
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingEntryDto {
    pub task_id: u64,
    pub ast: f64,
    pub aft: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateEntryDto {
    pub task_id: u64,
    pub vm_index: usize,
    pub ast: f64,
    pub aft: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsDto {
    pub makespan: f64,
    pub slr: f64,
    pub avu: f64,
    pub vf: f64,
    pub duplication_count: usize,
    pub critical_path: Vec<u64>,
}

/// The full output bundle, ready to be serialized to JSON (spec §6 "Output
/// bundle").
#[derive(Debug, Clone, Serialize)]
pub struct OutputDto {
    pub schedule: HashMap<usize, Vec<u64>>,
    pub duplicates: Vec<DuplicateEntryDto>,
    pub timings: Vec<TimingEntryDto>,
    pub metrics: MetricsDto,
}

pub fn build_output(graph: &TaskGraph, output: &EngineOutput) -> OutputDto {
    let schedule = output.schedule.iter().map(|(&vm, tasks)| (vm.get(), tasks.iter().map(|t| t.value()).collect())).collect();

    let mut duplicates: Vec<DuplicateEntryDto> = output
        .timings
        .duplicates()
        .map(|(task, vm, ast, aft)| DuplicateEntryDto { task_id: task.value(), vm_index: vm.get(), ast, aft })
        .collect();
    duplicates.sort_by_key(|d| (d.task_id, d.vm_index));

    let timings = graph
        .task_ids_sorted()
        .into_iter()
        .map(|task| TimingEntryDto { task_id: task.value(), ast: output.timings.ast(task), aft: output.timings.aft(task) })
        .collect();

    let mut critical_path: Vec<u64> = output.critical_path.tasks().iter().map(|t| t.value()).collect();
    critical_path.sort_unstable();

    let metrics = MetricsDto {
        makespan: output.metrics.makespan,
        slr: output.metrics.slr,
        avu: output.metrics.avu,
        vf: output.metrics.vf,
        duplication_count: output.metrics.duplication_count,
        critical_path,
    };

    OutputDto { schedule, duplicates, timings, metrics }
}
