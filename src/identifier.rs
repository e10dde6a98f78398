//! Work item identifier normalization
//!
//! Every item is keyed by a posix-style path relative to the dataset root.
//! The same rule is used when indexing the manifest and when matching
//! checkpointed results, so it must stay a pure, deterministic function.

use std::path::{Component, Path, PathBuf};

/// Derive the identifier for `path` relative to `root`
///
/// A relative `root` is anchored at the current directory first, so `data` and
/// `/abs/data` yield the same identifiers. Relative inputs are interpreted
/// against `root`. `.` and `..` components are resolved lexically (symlinks are
/// not followed). The result uses `/` separators regardless of platform.
///
/// If the path does not live under `root`, the normalized absolute form is
/// returned instead.
///
/// # Examples
///
/// ```
/// use caption_pipeline::identifier::normalize_identifier;
///
/// let id = normalize_identifier("/data/eval", "/data/eval/L1/short/a.mp4");
/// assert_eq!(id, "L1/short/a.mp4");
///
/// let outside = normalize_identifier("/data/eval", "/elsewhere/b.mp4");
/// assert_eq!(outside, "/elsewhere/b.mp4");
/// ```
pub fn normalize_identifier(root: impl AsRef<Path>, path: impl AsRef<Path>) -> String {
    let root = lexical_clean(&absolutize(root.as_ref()));
    let path = path.as_ref();
    let full = if path.is_absolute() {
        lexical_clean(path)
    } else {
        lexical_clean(&root.join(path))
    };

    match full.strip_prefix(&root) {
        Ok(relative) if !relative.as_os_str().is_empty() => to_posix(relative, false),
        _ => to_posix(&full, full.has_root()),
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolve `.` and `..` without touching the filesystem
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_posix(path: &Path, absolute: bool) -> String {
    let mut parts = Vec::new();
    let mut prefix = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = p.as_os_str().to_string_lossy().into_owned(),
            Component::RootDir => {}
            Component::CurDir => {}
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("{prefix}/{joined}")
    } else {
        joined
    }
}
