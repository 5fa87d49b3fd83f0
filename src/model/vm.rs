use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::ids::{VmId, VmIndex};

/// A heterogeneous virtual machine (spec §3).
///
/// `bandwidth` maps peer `VmId` to the pairwise link bandwidth; it must be
/// complete for all peers other than `self` (enforced by
/// [`VmPool::new`]). Self-bandwidth is never consulted — same-VM
/// communication is always zero (spec §4.B).
#[derive(Debug, Clone)]
pub struct Vm {
    pub id: VmId,
    pub index: VmIndex,
    pub processing_capacity: f64,
    pub bandwidth: HashMap<VmId, f64>,
}

impl Vm {
    pub fn new(id: VmId, index: VmIndex, processing_capacity: f64, bandwidth: HashMap<VmId, f64>) -> Self {
        Self { id, index, processing_capacity, bandwidth }
    }

    pub fn bandwidth_to(&self, peer: VmId) -> Option<f64> {
        self.bandwidth.get(&peer).copied()
    }
}

/// Execution time of `size` on this VM: `size / capacity`. `None` ("not
/// schedulable") when capacity is non-positive (spec §4.B); callers treat
/// that as an infinite execution time and exclude it from averages/minima.
pub fn execution_time(size: f64, vm: &Vm) -> Option<f64> {
    if vm.processing_capacity > 0.0 { Some(size / vm.processing_capacity) } else { None }
}

/// A dense pool of VMs, indexed by their contiguous `VmIndex` (spec §9:
/// "replace repeated linear scans ... with dense arrays indexed by ...
/// index").
#[derive(Debug, Clone)]
pub struct VmPool {
    vms: Vec<Vm>,
    id_to_index: HashMap<VmId, VmIndex>,
}

impl VmPool {
    /// Builds the pool, validating that every VM reports a positive capacity
    /// and that the bandwidth matrix is complete for all `i != j` pairs.
    pub fn new(vms: Vec<Vm>) -> Result<Self> {
        for vm in &vms {
            if vm.processing_capacity <= 0.0 {
                return Err(Error::InvalidCapacity { vm: vm.index, capacity: vm.processing_capacity });
            }
        }

        let id_to_index: HashMap<VmId, VmIndex> = vms.iter().map(|vm| (vm.id, vm.index)).collect();

        for vm in &vms {
            for other in &vms {
                if other.id == vm.id {
                    continue;
                }
                if vm.bandwidth_to(other.id).is_none() {
                    return Err(Error::MissingBandwidth { from: vm.index, to: other.index });
                }
            }
        }

        let mut by_index = vms;
        by_index.sort_by_key(|vm| vm.index);
        for (position, vm) in by_index.iter().enumerate() {
            if vm.index.get() != position {
                return Err(Error::InvalidGraph {
                    reason: format!("VM indices must be contiguous and 0-based; found gap or duplicate at position {position}"),
                });
            }
        }

        Ok(Self { vms: by_index, id_to_index })
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    pub fn get(&self, index: VmIndex) -> &Vm {
        &self.vms[index.get()]
    }

    pub fn index_of(&self, id: VmId) -> Option<VmIndex> {
        self.id_to_index.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vm> {
        self.vms.iter()
    }

    pub fn indices(&self) -> impl Iterator<Item = VmIndex> {
        (0..self.vms.len()).map(VmIndex::new)
    }

    pub fn total_capacity(&self) -> f64 {
        self.vms.iter().map(|vm| vm.processing_capacity).sum()
    }

    /// Pairwise bandwidth between two VM indices, looked up through their ids.
    pub fn bandwidth_between(&self, a: VmIndex, b: VmIndex) -> Option<f64> {
        if a == b {
            return Some(0.0);
        }
        let vm_a = self.get(a);
        let vm_b = self.get(b);
        vm_a.bandwidth_to(vm_b.id)
    }
}
