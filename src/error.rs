use thiserror::Error;

use crate::model::ids::{TaskId, VmIndex};

/// Crate-wide error taxonomy. Every fatal condition the engine can raise is
/// one variant here (spec §7); variants carry the offending ids and the
/// invariant name so regressions can be pinpointed from the error alone.
#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse scenario JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("invalid graph: {reason}")]
    InvalidGraph { reason: String },

    #[error("no exit task: {reason}")]
    NoExitTask { reason: String },

    #[error("task {task} is unschedulable: no VM offers a finite execution time for it")]
    UnschedulableTask { task: TaskId },

    #[error("missing bandwidth entry between VM {from} and VM {to} required by DCP-formula mode")]
    MissingBandwidth { from: VmIndex, to: VmIndex },

    #[error("VM {vm} reports non-positive processing capacity: {capacity}")]
    InvalidCapacity { vm: VmIndex, capacity: f64 },

    #[error("schedule invariant violated ({invariant}): {detail}")]
    ScheduleInvariantViolated { invariant: String, detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;
