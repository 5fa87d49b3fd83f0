use std::collections::HashMap;

use crate::model::ids::{TaskId, VmIndex};

/// Where every (non-duplicated) task has been placed. Populated by SMGT
/// (component D) and read throughout the rest of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    vm_of: HashMap<TaskId, VmIndex>,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, task: TaskId, vm: VmIndex) {
        self.vm_of.insert(task, vm);
    }

    pub fn vm_of(&self, task: TaskId) -> Option<VmIndex> {
        self.vm_of.get(&task).copied()
    }

    pub fn len(&self) -> usize {
        self.vm_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vm_of.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, VmIndex)> + '_ {
        self.vm_of.iter().map(|(&t, &v)| (t, v))
    }
}

/// The final schedule: per-VM ordered task id lists (spec §3). A task id may
/// repeat across VMs when LOTD has introduced a duplicate of it.
pub type Schedule = HashMap<VmIndex, Vec<TaskId>>;
