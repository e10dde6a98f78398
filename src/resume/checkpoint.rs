//! Checkpoint loading from an existing result file
//!
//! Each line of the result file is an independent record. Lines that fail to
//! parse (e.g. a partial line left by an interrupted append) are skipped, as
//! are records without a caption.

use super::ResumeError;
use crate::CaptionResult;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use tracing::{debug, info, warn};

/// Completed results keyed by identifier, in file order
pub type CheckpointMap = IndexMap<String, CaptionResult>;

/// Counters describing a checkpoint load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records accepted into the map (after de-duplication)
    pub loaded: usize,
    /// Lines that were not valid JSON records
    pub malformed: usize,
    /// Records without an identifier or with an empty caption
    pub incomplete: usize,
}

/// Lenient line shape, so null or missing fields are counted instead of rejected
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    video_name: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

/// Load completed results from `path`
///
/// A missing file yields an empty map. Only real IO failures are errors.
pub fn load_checkpoint(path: &Path) -> Result<(CheckpointMap, LoadReport), ResumeError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No result file found, starting fresh");
            return Ok((CheckpointMap::new(), LoadReport::default()));
        }
        Err(e) => {
            return Err(ResumeError::IoError(format!(
                "Failed to open {}: {e}",
                path.display()
            )))
        }
    };

    let mut map = CheckpointMap::new();
    let mut report = LoadReport::default();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(line = line_no + 1, "Skipping result line with invalid UTF-8");
                report.malformed += 1;
                continue;
            }
            Err(e) => {
                return Err(ResumeError::IoError(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: RawRecord = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping malformed result line");
                report.malformed += 1;
                continue;
            }
        };

        match (raw.video_name, raw.caption) {
            (Some(identifier), Some(text)) if !identifier.is_empty() && !text.trim().is_empty() => {
                map.insert(identifier.clone(), CaptionResult { identifier, text });
            }
            (identifier, _) => {
                debug!(line = line_no + 1, identifier = ?identifier, "Ignoring record without caption");
                report.incomplete += 1;
            }
        }
    }

    report.loaded = map.len();
    info!(
        path = %path.display(),
        loaded = report.loaded,
        malformed = report.malformed,
        incomplete = report.incomplete,
        "Checkpoint loaded"
    );
    Ok((map, report))
}
