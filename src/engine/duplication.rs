//! Component E — limited optimistic task duplication (LOTD, spec §4.E).
//!
//! For every entry task, tries duplicating it onto each VM that hosts one of
//! its successors, accepting the duplicate only when it provably tightens
//! that successor's data-ready time (Rule 1) and never disturbs any slot
//! already on the candidate VM (Rule 2). Accepted duplicates are propagated
//! through the successor closure so downstream AST/AFT stay consistent.

use std::collections::HashMap;

use crate::engine::timing::{reschedule_task, successor_closure, Slot, Timings};
use crate::error::Result;
use crate::model::comm::{comm_time, CommCostTable};
use crate::model::graph::TaskGraph;
use crate::model::ids::{TaskId, VmIndex};
use crate::model::placement::{Placement, Schedule};
use crate::model::vm::{execution_time, VmPool};

/// Which (task, VM) duplicates LOTD accepted, keyed by VM for reporting
/// (spec §3 "duplication record").
#[derive(Debug, Clone, Default)]
pub struct DuplicationRecord {
    by_vm: HashMap<VmIndex, Vec<TaskId>>,
}

impl DuplicationRecord {
    fn add(&mut self, vm: VmIndex, task: TaskId) {
        self.by_vm.entry(vm).or_default().push(task);
    }

    pub fn by_vm(&self) -> &HashMap<VmIndex, Vec<TaskId>> {
        &self.by_vm
    }

    pub fn count(&self) -> usize {
        self.by_vm.values().map(Vec::len).sum()
    }
}

/// Runs LOTD over every entry task, in ascending id order (spec §4.E step 1),
/// mutating `schedule` and `timings` in place for every accepted duplicate.
pub fn run_lotd(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    placement: &Placement,
    schedule: &mut Schedule,
    timings: &mut Timings,
) -> Result<DuplicationRecord> {
    let mut record = DuplicationRecord::default();

    for entry in graph.entry_tasks() {
        let original_vm = placement.vm_of(entry).expect("every task is placed before LOTD runs");

        // Candidate VMs: those hosting at least one of `entry`'s successors,
        // other than its own, in ascending index order (spec §4.E step 2).
        let mut candidates: Vec<VmIndex> = graph
            .get(entry)
            .successors
            .iter()
            .filter_map(|&succ| placement.vm_of(succ))
            .filter(|&vm| vm != original_vm)
            .collect();
        candidates.sort_by_key(VmIndex::get);
        candidates.dedup();

        for candidate in candidates {
            try_duplicate(graph, vms, table, placement, schedule, timings, &mut record, entry, original_vm, candidate)?;
        }
    }

    Ok(record)
}

#[allow(clippy::too_many_arguments)]
fn try_duplicate(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    placement: &Placement,
    schedule: &mut Schedule,
    timings: &mut Timings,
    record: &mut DuplicationRecord,
    entry: TaskId,
    original_vm: VmIndex,
    candidate: VmIndex,
) -> Result<()> {
    // The successor of `entry` hosted on `candidate` with the tightest AST
    // (smallest id breaks ties) sets the deadline the duplicate must beat
    // (spec §4.E step 3).
    let target = graph
        .get(entry)
        .successors
        .iter()
        .copied()
        .filter(|&succ| placement.vm_of(succ) == Some(candidate))
        .min_by(|&a, &b| timings.ast(a).total_cmp(&timings.ast(b)).then(a.value().cmp(&b.value())));

    let Some(target) = target else {
        return Ok(()); // candidate derived from a stale successor placement; nothing to beat
    };
    let deadline = timings.ast(target);

    // A candidate VM the entry task can't even run on (non-positive
    // capacity) is simply not a duplication target, not a fatal error —
    // the task is already placed and schedulable elsewhere.
    let Some(et) = execution_time(graph.get(entry).size, vms.get(candidate)) else {
        return Ok(());
    };

    let Some((start, index)) = timings.timeline(candidate).find_gap_within(et, 0.0, deadline) else {
        return Ok(()); // no idle slot early enough to help
    };
    let dup_aft = start + et;

    // Rule 1 (benefit): the duplicate must arrive strictly before the
    // status quo — `target`'s current cross-VM arrival of `entry`'s result.
    let status_quo = timings.aft(entry) + comm_time(table, vms, entry, target, original_vm, candidate);
    if !(dup_aft + crate::engine::config::EPSILON < status_quo) {
        return Ok(());
    }

    // Rule 2 (no-harm): the new slot must not overlap any slot already on
    // `candidate`. `find_gap_within` guarantees this; re-check defensively.
    if timings.timeline(candidate).overlaps(start, dup_aft) {
        return Ok(());
    }

    timings.timeline_mut(candidate).insert_at(index, Slot { task: entry, ast: start, aft: dup_aft });
    timings.record_duplicate(entry, candidate, start, dup_aft);
    schedule.entry(candidate).or_default().push(entry);
    record.add(candidate, entry);

    // Propagate: every task downstream of `entry` may now have an earlier
    // DRT on `candidate` (spec §4.E step 5). Reschedule them in topological
    // order so each sees the already-updated timing of its predecessors.
    let closure = successor_closure(graph, entry);
    for task in graph.topological_order() {
        if closure.contains(&task) {
            reschedule_task(graph, vms, table, placement, timings, task)?;
        }
    }

    Ok(())
}
