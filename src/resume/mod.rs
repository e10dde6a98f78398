//! Resume capability for captioning runs
//!
//! Completed captions are read back from the result file at startup, and an
//! advisory lock keeps two processes from driving the same result file.

pub mod checkpoint;
pub mod lock;

pub use checkpoint::{load_checkpoint, CheckpointMap, LoadReport};
pub use lock::RunLock;

/// Errors related to resume state
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}
