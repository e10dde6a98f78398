//! CLI error types and conversions

use crate::gateway::{InferenceError, PromptError};
use crate::index::IndexError;
use crate::resume::ResumeError;
use crate::runner::RunError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Index error
    #[error("index error: {0}")]
    IndexError(#[from] IndexError),

    /// Resume error
    #[error("resume error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Run error
    #[error("run error: {0}")]
    RunError(#[from] RunError),

    /// Prompt error
    #[error("prompt error: {0}")]
    PromptError(#[from] PromptError),

    /// Inference backend setup error
    #[error("inference error: {0}")]
    InferenceError(#[from] InferenceError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
