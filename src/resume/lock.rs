//! Advisory lock guarding a result file against concurrent runs
//!
//! Two runs writing the same result file would race on the temp-file rename
//! and drop each other's captions. The lock lives in a sibling `.lock` file.

use super::ResumeError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file handle for one result file
pub struct RunLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl RunLock {
    /// Open (creating if needed) the lock file belonging to `result_path`
    pub fn open(result_path: &Path) -> Result<Self, ResumeError> {
        if let Some(parent) = result_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let path = lock_path(result_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Take the exclusive lock without blocking
    ///
    /// The lock is held as long as the returned guard lives.
    pub fn try_exclusive(&mut self) -> Result<RwLockWriteGuard<'_, File>, ResumeError> {
        debug!(path = %self.path.display(), "Acquiring run lock");
        let path = self.path.clone();
        self.lock.try_write().map_err(|e| {
            if e.kind() == ErrorKind::WouldBlock {
                ResumeError::LockError(format!(
                    "another run is already using this result file ({})",
                    path.display()
                ))
            } else {
                ResumeError::LockError(format!("Failed to acquire lock: {e}"))
            }
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `captions.jsonl` -> `captions.jsonl.lock`
fn lock_path(result_path: &Path) -> PathBuf {
    let mut name = result_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "results".into());
    name.push(".lock");
    result_path.with_file_name(name)
}
