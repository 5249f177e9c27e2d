use std::path::PathBuf;

use thiserror::Error;


/// Failures the run can stop with. They travel inside [`shared::anyhow::Error`] so the call
/// chain can attach context, and callers can `downcast_ref::<AssignError>()` to tell them apart.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("input {kind} {path:?} does not exist")]
    MissingInput { kind: &'static str, path: PathBuf },

    #[error("cannot read trajectory {path:?}: {reason}")]
    UnreadableTrajectory { path: PathBuf, reason: String },

    #[error("unsupported file format of {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("protein and ligand index sets share {} atom(s), the first one is {}", .0.len(), .0[0])]
    IndexSetOverlap(Vec<usize>),

    #[error("invalid index set: {0}")]
    InvalidIndexSet(String),

    #[error("generator file {0:?} holds no frame")]
    NoGenerators(PathBuf),

    #[error("cannot merge results: {0}")]
    MergeMismatch(String),

    #[error("worker of rank {rank} failed: {reason}")]
    WorkerFailed { rank: usize, reason: String },

    #[error("rank {rank} aborted as the coordinator is gone")]
    Aborted { rank: usize },
}
