use std::fmt;
use std::marker::PhantomData;

/// A stable, externally-assigned integer identity, tagged by phantom type so
/// that ids for different entity kinds cannot be mixed up at the type level
/// (spec §9 design note: "same-id-as-key confusion between VM id and VM
/// index").
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id<T> {
    value: u64,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub const fn new(value: u64) -> Self {
        Id { value, _marker: PhantomData }
    }

    pub const fn value(self) -> u64 {
        self.value
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");
        write!(f, "{}({})", display_name, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskTag;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmTag;

/// Stable, externally-assigned task identity (spec §3: "stable integer id").
pub type TaskId = Id<TaskTag>;

/// Stable, externally-assigned VM identity. Used only for bandwidth-matrix
/// lookups, never as a schedule/timing-table key (spec §9).
pub type VmId = Id<VmTag>;

/// The contiguous, 0-based position of a VM in the pool. This — not `VmId`
/// — is the key used by the schedule and timing tables (spec §3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VmIndex(usize);

impl VmIndex {
    pub const fn new(index: usize) -> Self {
        VmIndex(index)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for VmIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for VmIndex {
    fn from(value: usize) -> Self {
        VmIndex(value)
    }
}

impl From<VmIndex> for usize {
    fn from(value: VmIndex) -> Self {
        value.0
    }
}
