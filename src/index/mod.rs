//! Canonical item ordering
//!
//! The item index fixes the order in which the result file is written. Two
//! sources are supported:
//!
//! - a JSON manifest: an array of groups, each with an `items` list whose
//!   entries carry a `path` and a media field (`{"path": "L1", "video": "a.mp4"}`)
//! - a directory layout: `root/<group>/*.<extension>` for a fixed list of
//!   groups, files sorted by name
//!
//! Both produce the same order for the same input on every run.

use crate::WorkItem;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default name of the manifest field holding the media file name
pub const DEFAULT_MEDIA_FIELD: &str = "video";

/// Item index errors
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Manifest file (or layout root) does not exist
    #[error("manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// Manifest exists but cannot be used
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// IO error while reading the manifest or scanning directories
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Deserialize)]
struct ManifestGroup {
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

/// Ordered, de-duplicated list of work items for one run
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    items: Vec<WorkItem>,
}

impl ItemIndex {
    /// Build an index from already constructed items
    ///
    /// Later duplicates of an identifier are dropped.
    pub fn from_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for item in items {
            if seen.insert(item.identifier.clone()) {
                unique.push(item);
            } else {
                warn!(identifier = %item.identifier, "Duplicate item in index, keeping first occurrence");
            }
        }
        Self { items: unique }
    }

    /// Load the index from a JSON manifest
    ///
    /// `media_field` names the item key holding the media file name. Relative
    /// item paths are resolved against `root`.
    pub fn from_manifest(
        manifest: impl AsRef<Path>,
        root: impl AsRef<Path>,
        media_field: &str,
    ) -> IndexResult<Self> {
        let manifest = manifest.as_ref();
        let root = root.as_ref();

        if !manifest.exists() {
            return Err(IndexError::ManifestNotFound(manifest.to_path_buf()));
        }

        let contents = std::fs::read_to_string(manifest)
            .map_err(|e| IndexError::IoError(format!("Failed to read {}: {e}", manifest.display())))?;
        let groups: Vec<ManifestGroup> = serde_json::from_str(&contents)
            .map_err(|e| IndexError::InvalidManifest(format!("{}: {e}", manifest.display())))?;

        let mut items = Vec::new();
        for (group_idx, group) in groups.iter().enumerate() {
            for (item_idx, entry) in group.items.iter().enumerate() {
                let dir = string_field(entry, "path").ok_or_else(|| {
                    IndexError::InvalidManifest(format!(
                        "group {group_idx} item {item_idx}: missing string field \"path\""
                    ))
                })?;
                let media = string_field(entry, media_field).ok_or_else(|| {
                    IndexError::InvalidManifest(format!(
                        "group {group_idx} item {item_idx}: missing string field \"{media_field}\""
                    ))
                })?;

                let dir = Path::new(dir);
                let dir = if dir.is_absolute() {
                    dir.to_path_buf()
                } else {
                    root.join(dir)
                };
                items.push(WorkItem::new(root, dir.join(media)));
            }
        }

        let index = Self::from_items(items);
        info!(
            manifest = %manifest.display(),
            groups = groups.len(),
            items = index.len(),
            "Loaded item manifest"
        );
        Ok(index)
    }

    /// Build the index by scanning `root/<group>` directories in order
    ///
    /// Within a group, files matching `extension` are sorted by name. Missing
    /// group directories are skipped with a warning.
    pub fn scan_layout<S: AsRef<str>>(
        root: impl AsRef<Path>,
        groups: &[S],
        extension: &str,
    ) -> IndexResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexError::ManifestNotFound(root.to_path_buf()));
        }
        let extension = extension.trim_start_matches('.');

        let mut items = Vec::new();
        for group in groups {
            let dir = root.join(group.as_ref());
            if !dir.is_dir() {
                warn!(directory = %dir.display(), "Group directory does not exist, skipping");
                continue;
            }

            let mut files = Vec::new();
            let entries = std::fs::read_dir(&dir)
                .map_err(|e| IndexError::IoError(format!("Failed to read {}: {e}", dir.display())))?;
            for entry in entries {
                let entry = entry.map_err(|e| {
                    IndexError::IoError(format!("Failed to read directory entry: {e}"))
                })?;
                let path = entry.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                    files.push(path);
                }
            }
            files.sort();

            debug!(group = group.as_ref(), files = files.len(), "Scanned group directory");
            items.extend(files.into_iter().map(|path| WorkItem::new(root, path)));
        }

        let index = Self::from_items(items);
        info!(root = %root.display(), items = index.len(), "Scanned directory layout");
        Ok(index)
    }

    /// Items in canonical order
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Identifiers in canonical order
    pub fn canonical_order(&self) -> Vec<String> {
        self.items.iter().map(|item| item.identifier.clone()).collect()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn string_field<'a>(entry: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str)
}
