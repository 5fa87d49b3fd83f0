//! Component F — the schedule timing engine (spec §4.F). Single source of
//! truth for AST/AFT: given a placement, propagates data-ready and
//! machine-ready times through the DAG in topological order, maintaining
//! each VM's execution order as a list of non-overlapping slots sorted by
//! AST with binary insertion.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::engine::config::EPSILON;
use crate::error::{Error, Result};
use crate::model::comm::{comm_time, CommCostTable};
use crate::model::graph::TaskGraph;
use crate::model::ids::{TaskId, VmIndex};
use crate::model::placement::Placement;
use crate::model::vm::{execution_time, VmPool};

/// One scheduled occurrence of a task on a VM: either the task's single
/// original slot, or — on a VM other than its own — a duplicate introduced
/// by LOTD (spec §9: "duplicates as phantom tasks", never aliasing the
/// original's AST/AFT).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub task: TaskId,
    pub ast: f64,
    pub aft: f64,
}

/// A VM's execution order: slots sorted ascending by AST, with no two
/// overlapping beyond `EPSILON` (spec §9: "insertion-based scheduling").
#[derive(Debug, Clone, Default)]
pub struct VmTimeline {
    slots: Vec<Slot>,
}

impl VmTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Earliest `(start, insertion_index)` at or after `not_before` where a
    /// slot of length `duration` fits without overlapping any existing slot
    /// (spec §4.B insertion rule: gap before the first slot, a gap between
    /// two consecutive slots, or after the last slot).
    pub fn find_gap(&self, duration: f64, not_before: f64) -> (f64, usize) {
        let mut cursor = not_before;
        for (index, slot) in self.slots.iter().enumerate() {
            if cursor + duration <= slot.ast + EPSILON {
                return (cursor, index);
            }
            cursor = cursor.max(slot.aft);
        }
        (cursor, self.slots.len())
    }

    /// As [`find_gap`], but additionally requires the slot to end at or
    /// before `deadline` (spec §4.E step 3b). `None` if no such gap exists.
    pub fn find_gap_within(&self, duration: f64, not_before: f64, deadline: f64) -> Option<(f64, usize)> {
        let (start, index) = self.find_gap(duration, not_before);
        if start + duration <= deadline + EPSILON { Some((start, index)) } else { None }
    }

    pub fn insert_at(&mut self, index: usize, slot: Slot) {
        self.slots.insert(index, slot);
    }

    /// Removes the slot for `task`, if present. Used by LOTD's propagation
    /// pass to re-insert a successor's slot once its DRT may have changed.
    pub fn remove_task(&mut self, task: TaskId) -> Option<Slot> {
        let position = self.slots.iter().position(|s| s.task == task)?;
        Some(self.slots.remove(position))
    }

    /// Whether `[ast, aft)` overlaps any existing slot (spec §4.E Rule 2
    /// validation: inserting a duplicate must not disturb any other slot).
    pub fn overlaps(&self, ast: f64, aft: f64) -> bool {
        self.slots.iter().any(|s| ast < s.aft - EPSILON && s.ast < aft - EPSILON)
    }

    fn no_overlaps_internally(&self) -> bool {
        self.slots.windows(2).all(|pair| pair[0].aft <= pair[1].ast + EPSILON)
    }
}

/// AST/AFT for every task, plus the per-(task, vm) table for LOTD
/// duplicates, plus every VM's execution-order timeline (spec §3 "Timing
/// tables").
#[derive(Debug, Clone, Default)]
pub struct Timings {
    ast: HashMap<TaskId, f64>,
    aft: HashMap<TaskId, f64>,
    dup_ast: HashMap<(TaskId, VmIndex), f64>,
    dup_aft: HashMap<(TaskId, VmIndex), f64>,
    timelines: Vec<VmTimeline>,
}

impl Timings {
    fn with_vm_count(count: usize) -> Self {
        Self { timelines: vec![VmTimeline::new(); count], ..Default::default() }
    }

    pub fn ast(&self, task: TaskId) -> f64 {
        self.ast[&task]
    }

    pub fn aft(&self, task: TaskId) -> f64 {
        self.aft[&task]
    }

    pub fn dup_ast(&self, task: TaskId, vm: VmIndex) -> Option<f64> {
        self.dup_ast.get(&(task, vm)).copied()
    }

    pub fn dup_aft(&self, task: TaskId, vm: VmIndex) -> Option<f64> {
        self.dup_aft.get(&(task, vm)).copied()
    }

    pub fn duplicates(&self) -> impl Iterator<Item = (TaskId, VmIndex, f64, f64)> + '_ {
        self.dup_ast.iter().map(|(&(task, vm), &ast)| (task, vm, ast, self.dup_aft[&(task, vm)]))
    }

    pub fn timeline(&self, vm: VmIndex) -> &VmTimeline {
        &self.timelines[vm.get()]
    }

    pub fn timeline_mut(&mut self, vm: VmIndex) -> &mut VmTimeline {
        &mut self.timelines[vm.get()]
    }

    /// Maximum AFT over every task's *original* slot. Duplicates never
    /// extend the makespan by construction (spec §4.G).
    pub fn makespan(&self) -> f64 {
        self.aft.values().copied().fold(0.0, f64::max)
    }

    fn set_original(&mut self, task: TaskId, ast: f64, aft: f64) {
        self.ast.insert(task, ast);
        self.aft.insert(task, aft);
    }

    /// Records a LOTD duplicate's AST/AFT for `task` on `vm` (spec §4.E
    /// step 4). Does not touch `vm`'s timeline — the caller is responsible
    /// for inserting the corresponding [`Slot`].
    pub fn record_duplicate(&mut self, task: TaskId, vm: VmIndex, ast: f64, aft: f64) {
        self.dup_ast.insert((task, vm), ast);
        self.dup_aft.insert((task, vm), aft);
    }

    #[allow(dead_code)]
    fn clear_duplicate(&mut self, task: TaskId, vm: VmIndex) {
        self.dup_ast.remove(&(task, vm));
        self.dup_aft.remove(&(task, vm));
    }
}

pub fn execution_time_or_err(graph: &TaskGraph, vms: &VmPool, task: TaskId, vm: VmIndex) -> Result<f64> {
    let size = graph.get(task).size;
    execution_time(size, vms.get(vm)).ok_or(Error::UnschedulableTask { task })
}

/// Data Ready Time of `task` if placed on `vm` (spec §4.B): the latest
/// arrival among its predecessors, using a duplicate's AFT with zero
/// communication cost when one exists on `vm`.
pub fn data_ready_time(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    placement: &Placement,
    timings: &Timings,
    task: TaskId,
    vm: VmIndex,
) -> f64 {
    graph
        .get(task)
        .predecessors
        .iter()
        .map(|&pred| {
            if let Some(dup_aft) = timings.dup_aft(pred, vm) {
                return dup_aft;
            }
            let vm_pred = placement.vm_of(pred).expect("predecessors are scheduled before successors in topological order");
            let aft_pred = timings.aft(pred);
            aft_pred + comm_time(table, vms, pred, task, vm_pred, vm)
        })
        .fold(0.0, f64::max)
}

/// Computes and inserts the slot for `task` on its placed VM, updating
/// `timings` in place. Returns the resulting `(ast, aft)`.
fn schedule_task(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    placement: &Placement,
    timings: &mut Timings,
    task: TaskId,
) -> Result<(f64, f64)> {
    let vm = placement.vm_of(task).expect("every task is placed before its timing is computed");
    let et = execution_time_or_err(graph, vms, task, vm)?;
    let drt = data_ready_time(graph, vms, table, placement, timings, task, vm);
    let (ast, index) = timings.timeline(vm).find_gap(et, drt);
    let aft = ast + et;
    timings.timeline_mut(vm).insert_at(index, Slot { task, ast, aft });
    timings.set_original(task, ast, aft);
    Ok((ast, aft))
}

/// Full timing computation from scratch (spec §4.F steps 1-2): topologically
/// sorts tasks and schedules each one in order.
pub fn compute_timings(graph: &TaskGraph, vms: &VmPool, table: &CommCostTable, placement: &Placement) -> Result<Timings> {
    let mut timings = Timings::with_vm_count(vms.len());
    for task in graph.topological_order() {
        schedule_task(graph, vms, table, placement, &mut timings, task)?;
    }
    Ok(timings)
}

/// Removes `task`'s current slot from its VM and reschedules it against the
/// present state of `timings` (used by LOTD's propagation pass — spec
/// §4.E step 5 — after a duplicate may have changed a successor's DRT).
pub fn reschedule_task(
    graph: &TaskGraph,
    vms: &VmPool,
    table: &CommCostTable,
    placement: &Placement,
    timings: &mut Timings,
    task: TaskId,
) -> Result<(f64, f64)> {
    let vm = placement.vm_of(task).expect("task is placed");
    timings.timeline_mut(vm).remove_task(task);
    schedule_task(graph, vms, table, placement, timings, task)
}

/// All tasks reachable from `start` via successor edges (`start` excluded),
/// used to bound LOTD's post-acceptance propagation (spec §4.E step 5).
pub fn successor_closure(graph: &TaskGraph, start: TaskId) -> HashSet<TaskId> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<TaskId> = graph.get(start).successors.iter().copied().collect();
    while let Some(task) = queue.pop_front() {
        if seen.insert(task) {
            queue.extend(graph.get(task).successors.iter().copied());
        }
    }
    seen
}

/// Post-LOTD validation (spec §4.F, §8 universal invariants): no two slots
/// on any VM overlap, and every dependency edge's precedence constraint
/// holds either through a shared VM, a local duplicate, or the
/// communication-augmented inequality.
pub fn validate(graph: &TaskGraph, vms: &VmPool, table: &CommCostTable, placement: &Placement, timings: &Timings) -> Result<()> {
    for vm in vms.indices() {
        let timeline = timings.timeline(vm);
        if !timeline.no_overlaps_internally() {
            return Err(Error::ScheduleInvariantViolated {
                invariant: "no-overlap".to_string(),
                detail: format!("VM {vm} has overlapping slots"),
            });
        }
    }

    for task in graph.tasks() {
        let v = task.id;
        let vm_v = placement.vm_of(v).expect("every task is placed");
        let ast_v = timings.ast(v);

        for &u in &task.predecessors {
            let vm_u = placement.vm_of(u).expect("every task is placed");
            let ok = if vm_u == vm_v {
                timings.aft(u) <= ast_v + EPSILON
            } else if let Some(dup_aft) = timings.dup_aft(u, vm_v) {
                dup_aft <= ast_v + EPSILON
            } else {
                timings.aft(u) + comm_time(table, vms, u, v, vm_u, vm_v) <= ast_v + EPSILON
            };
            if !ok {
                return Err(Error::ScheduleInvariantViolated {
                    invariant: "precedence".to_string(),
                    detail: format!("edge {u} -> {v} is violated under the final placement"),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(task: u64, ast: f64, aft: f64) -> Slot {
        Slot { task: TaskId::new(task), ast, aft }
    }

    #[test]
    fn find_gap_fits_between_two_slots() {
        let mut timeline = VmTimeline::new();
        timeline.insert_at(0, slot(0, 0.0, 5.0));
        timeline.insert_at(1, slot(1, 20.0, 30.0));

        // A 10-unit task fits in the [5, 20) gap.
        let (start, index) = timeline.find_gap(10.0, 0.0);
        assert_eq!(index, 1);
        assert!((start - 5.0).abs() < EPSILON);
    }

    #[test]
    fn find_gap_falls_through_to_after_last_slot() {
        let mut timeline = VmTimeline::new();
        timeline.insert_at(0, slot(0, 0.0, 5.0));
        timeline.insert_at(1, slot(1, 5.0, 10.0));

        let (start, index) = timeline.find_gap(3.0, 0.0);
        assert_eq!(index, 2);
        assert!((start - 10.0).abs() < EPSILON);
    }

    #[test]
    fn find_gap_within_rejects_a_gap_past_the_deadline() {
        let mut timeline = VmTimeline::new();
        timeline.insert_at(0, slot(0, 0.0, 251.0));
        timeline.insert_at(1, slot(1, 252.0, 260.0));

        assert!(timeline.find_gap_within(2.0, 0.0, 252.0).is_none());
        assert!(timeline.find_gap_within(2.0, 0.0, 262.0).is_some());
    }

    #[test]
    fn overlaps_detects_any_intersection() {
        let mut timeline = VmTimeline::new();
        timeline.insert_at(0, slot(0, 10.0, 20.0));

        assert!(timeline.overlaps(15.0, 25.0));
        assert!(!timeline.overlaps(20.0, 30.0));
        assert!(!timeline.overlaps(0.0, 10.0));
    }
}
