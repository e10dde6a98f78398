//! Ordered, atomic rewrite of the result file
//!
//! The whole file is regenerated from the checkpoint map on every commit, so
//! its line order always follows the canonical item order no matter in which
//! order items completed. The new content is written to a temp file in the
//! same directory and renamed over the target.

use super::{OutputError, OutputResult};
use crate::resume::CheckpointMap;
use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writer for the JSON-lines result file
#[derive(Debug, Clone)]
pub struct OrderedWriter {
    path: PathBuf,
}

impl OrderedWriter {
    /// Create a writer targeting `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the result file from `results`
    ///
    /// Identifiers are emitted in `canonical_order`; ones missing from
    /// `results` are skipped. Results whose identifier is not part of the
    /// canonical order follow, in map order. Returns the number of lines
    /// written.
    pub fn flush(&self, results: &CheckpointMap, canonical_order: &[String]) -> OutputResult<usize> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

        let temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

        let mut writer = BufWriter::new(temp_file);
        let mut written = 0usize;
        let mut emitted: HashSet<&str> = HashSet::with_capacity(results.len());

        for identifier in canonical_order {
            if let Some(result) = results.get(identifier) {
                if emitted.insert(identifier.as_str()) {
                    write_line(&mut writer, result)?;
                    written += 1;
                }
            }
        }
        for (identifier, result) in results {
            if !emitted.contains(identifier.as_str()) {
                write_line(&mut writer, result)?;
                written += 1;
            }
        }

        let temp_file = writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

        // Make the rename itself durable
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }

        debug!(path = %self.path.display(), lines = written, "Result file rewritten");
        Ok(written)
    }
}

fn write_line<W: Write>(writer: &mut W, result: &crate::CaptionResult) -> OutputResult<()> {
    serde_json::to_writer(&mut *writer, result)
        .map_err(|e| OutputError::SerializationError(e.to_string()))?;
    writer
        .write_all(b"\n")
        .map_err(|e| OutputError::IoError(format!("Failed to write to temp file: {e}")))
}
