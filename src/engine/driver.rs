//! Component H — the two-pass driver (spec §4.H): runs C → D → E → F → G
//! once using an assignment-free communication estimate, then again using
//! the first pass's placement to refine that estimate, and emits the
//! second pass's results.

use crate::engine::duplication::{run_lotd, DuplicationRecord};
use crate::engine::matching::{build_schedule, schedule_smgt};
use crate::engine::metrics::{self, Metrics};
use crate::engine::rank::{compute_ranks, critical_path, CriticalPath};
use crate::engine::timing::{self, Timings};
use crate::error::Result;
use crate::model::comm::{rank_comm_estimate_pass1, rank_comm_estimate_pass2, CommCostTable};
use crate::model::graph::TaskGraph;
use crate::model::placement::{Placement, Schedule};
use crate::model::vm::VmPool;

/// Everything the final schedule produced, bundled for the caller (spec §6
/// "Output bundle").
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub placement: Placement,
    pub schedule: Schedule,
    pub timings: Timings,
    pub duplication: DuplicationRecord,
    pub critical_path: CriticalPath,
    pub metrics: Metrics,
}

/// One full C → D → E → F pass: rank + critical path, SMGT placement,
/// schedule materialization, timing computation, LOTD.
fn run_pass(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    comm_estimate: &std::collections::HashMap<(crate::model::ids::TaskId, crate::model::ids::TaskId), f64>,
) -> Result<(Placement, Schedule, Timings, DuplicationRecord, CriticalPath)> {
    let rank = compute_ranks(graph, vms, comm_estimate)?;
    let cp = critical_path(graph, &rank);

    let placement = schedule_smgt(graph, vms, table, &cp, &rank);
    let mut schedule = build_schedule(graph, vms, &placement);
    let mut timings = timing::compute_timings(graph, vms, table, &placement)?;
    let duplication = run_lotd(graph, vms, table, &placement, &mut schedule, &mut timings)?;

    Ok((placement, schedule, timings, duplication, cp))
}

/// Runs both passes and returns the second pass's results (spec §4.H: "Emit
/// pass-2 results").
pub fn run(graph: &TaskGraph, vms: &VmPool, table: &CommCostTable) -> Result<EngineOutput> {
    let pass1_estimate = rank_comm_estimate_pass1(table, vms);
    let (pass1_placement, ..) = run_pass(graph, vms, table, &pass1_estimate)?;
    log::debug!("pass 1 complete: {} tasks placed", pass1_placement.len());

    let pass2_estimate = rank_comm_estimate_pass2(table, vms, &pass1_placement);
    let (placement, schedule, timings, duplication, cp) = run_pass(graph, vms, table, &pass2_estimate)?;

    timing::validate(graph, vms, table, &placement, &timings)?;

    let computed_metrics = metrics::compute(graph, vms, &placement, &timings, &cp, duplication.count());
    log::info!(
        "pass 2 complete: makespan={:.3} slr={:.3} avu={:.3} vf={:.6} duplications={}",
        computed_metrics.makespan,
        computed_metrics.slr,
        computed_metrics.avu,
        computed_metrics.vf,
        duplication.count()
    );

    Ok(EngineOutput { placement, schedule, timings, duplication, critical_path: cp, metrics: computed_metrics })
}
