//! Result and failure file writers

pub mod ledger;
pub mod ordered;

pub use ledger::FailureLedger;
pub use ordered::OrderedWriter;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Default failure file path for a result file: `captions.jsonl` -> `captions.failures.jsonl`
pub fn default_failure_path(result_path: &std::path::Path) -> std::path::PathBuf {
    let stem = result_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    result_path.with_file_name(format!("{stem}.failures.jsonl"))
}
