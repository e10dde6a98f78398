//! Append-only failure ledger
//!
//! Best-effort audit log: every per-item failure becomes one JSON line. A
//! write failure here is logged and reported to the caller, never raised.

use crate::{FailureReason, FailureRecord};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// JSON-lines failure file
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    /// Create a ledger appending to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one failure record
    ///
    /// Returns `false` if the record could not be written.
    pub fn record(&self, identifier: &str, reason: &FailureReason) -> bool {
        let record = FailureRecord::now(identifier, reason);
        match self.append(&record) {
            Ok(()) => {
                debug!(identifier, reason = %record.reason, "Failure recorded");
                true
            }
            Err(e) => {
                error!(
                    identifier,
                    reason = %record.reason,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to append to failure ledger"
                );
                false
            }
        }
    }

    fn append(&self, record: &FailureRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        // Single write call so a record is never interleaved with another line
        file.write_all(&line)?;
        file.flush()
    }
}
