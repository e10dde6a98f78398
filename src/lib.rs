//! # Caption Pipeline Library
//!
//! Resumable batch captioning for ordered media collections. Each item of a
//! dataset is sent to a vision-language model, and the generated caption is
//! committed to a JSON-lines result file immediately, so a run can be
//! interrupted at any point and resumed without redoing finished items.
//!
//! ## Features
//!
//! - **Resume Capability**: completed items are read back from the result file and skipped
//! - **Canonical Ordering**: the result file always follows manifest order, whatever the completion order
//! - **Atomic Commits**: every rewrite goes through a temp file and an atomic rename
//! - **Truncation Retry**: captions cut short by the token budget are retried a bounded number of times
//! - **Failure Quarantine**: per-item failures are appended to a failure ledger and never abort the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use caption_pipeline::gateway::{InferenceGateway, PromptSet};
//! use caption_pipeline::gateway::openai::{OpenAiBackend, OpenAiConfig};
//! use caption_pipeline::index::ItemIndex;
//! use caption_pipeline::runner::Runner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = ItemIndex::from_manifest("manifest.json", "/data/eval", "video")?;
//!
//! let backend = OpenAiBackend::new(OpenAiConfig::default())?;
//! let gateway = InferenceGateway::new(Arc::new(backend), PromptSet::default());
//!
//! let summary = Runner::new(gateway, "captions.jsonl").run(index.items()).await?;
//! println!("recorded {} captions", summary.recorded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - Deterministic identifier derivation shared by index and checkpoint
//! - [`index`] - Canonical item order from a manifest or a directory layout
//! - [`resume`] - Checkpoint loading and the run lock
//! - [`gateway`] - Prompt selection, model invocation and truncation retry
//! - [`output`] - Ordered result writer and failure ledger
//! - [`runner`] - The sequential run loop
//! - [`cli`] - Command line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// CLI command implementations
pub mod cli;

/// Model invocation and retry policy
pub mod gateway;

/// Identifier normalization
pub mod identifier;

/// Work item indexing
pub mod index;

/// Pipeline metrics
pub mod metrics;

/// Result and failure file writers
pub mod output;

/// Checkpoint loading and run locking
pub mod resume;

/// Sequential run loop
pub mod runner;

/// Graceful shutdown coordination
pub mod shutdown;

pub use identifier::normalize_identifier;

/// One unit of work: a media file to caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Posix-style key relative to the dataset root, unique within a run
    pub identifier: String,
    /// Location of the media on disk
    pub source_ref: PathBuf,
}

impl WorkItem {
    /// Build an item, deriving the identifier from `root`
    pub fn new(root: impl AsRef<std::path::Path>, source_ref: impl Into<PathBuf>) -> Self {
        let source_ref = source_ref.into();
        let identifier = normalize_identifier(root, &source_ref);
        Self {
            identifier,
            source_ref,
        }
    }

    /// `file://` URL of the media, as passed to the model endpoint
    pub fn media_url(&self) -> String {
        let absolute = if self.source_ref.is_absolute() {
            self.source_ref.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&self.source_ref))
                .unwrap_or_else(|_| self.source_ref.clone())
        };
        format!("file://{}", absolute.display())
    }
}

/// A committed caption, one line of the result file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionResult {
    /// Item identifier
    #[serde(rename = "video_name")]
    pub identifier: String,
    /// Generated caption, never empty
    #[serde(rename = "caption")]
    pub text: String,
}

/// Why an item could not be captioned in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The media file does not exist
    MissingSource,
    /// Every attempt hit the generation budget
    TruncationRetriesExceeded,
    /// The endpoint answered with something that could not be decoded
    DecodeError,
    /// The model finished without producing any text
    EmptyCaption,
    /// The caption was generated but the result file could not be rewritten
    WriteError(String),
    /// Any other per-item error, carrying its message
    Other(String),
}

impl FailureReason {
    /// Ledger representation of the reason
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingSource => "missing_source",
            Self::TruncationRetriesExceeded => "truncation_retries_exceeded",
            Self::DecodeError => "decode_error",
            Self::EmptyCaption => "empty_caption",
            Self::WriteError(_) => "write_error",
            Self::Other(message) => message,
        }
    }

    /// Reason string as written to the failure file
    pub fn to_ledger_string(&self) -> String {
        match self {
            Self::WriteError(message) => format!("write_error: {message}"),
            other => other.as_str().to_string(),
        }
    }

    /// Low-cardinality label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingSource => "missing_source",
            Self::TruncationRetriesExceeded => "truncation_retries_exceeded",
            Self::DecodeError => "decode_error",
            Self::EmptyCaption => "empty_caption",
            Self::WriteError(_) => "write_error",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ledger_string())
    }
}

/// One line of the failure file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Item identifier
    #[serde(rename = "video_name")]
    pub identifier: String,
    /// Failure cause
    pub reason: String,
    /// RFC 3339 UTC timestamp of the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
}

impl FailureRecord {
    /// Create a record stamped with the current time
    pub fn now(identifier: impl Into<String>, reason: &FailureReason) -> Self {
        Self {
            identifier: identifier.into(),
            reason: reason.to_ledger_string(),
            failed_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}
