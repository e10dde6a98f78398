//! Model invocation with prompt selection and truncation retry
//!
//! The [`CaptionBackend`] trait is the boundary to the captioning capability:
//! it takes a media URL, a prompt and a token budget, and reports the text,
//! whether generation stopped naturally or hit the budget, and token usage.
//!
//! [`InferenceGateway`] wraps a backend with the per-item policy:
//!
//! 1. draw a prompt from the [`PromptSet`]
//! 2. call the backend
//! 3. while the output is truncated, retry up to `max_retries_on_length` attempts
//! 4. never hand back a truncated or empty caption
//!
//! Backend errors end the item immediately; the run loop turns them into
//! failure records.

use crate::runner::config::{
    clamp_retries_on_length, DEFAULT_MAX_RETRIES_ON_LENGTH, DEFAULT_MAX_TOKENS,
};
use crate::{FailureReason, WorkItem};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod openai;
pub mod prompt;
pub mod retry;

pub use prompt::{PromptError, PromptSet};
pub use retry::{attempt, Attempted};

/// Errors raised by a captioning backend for a single call
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Connection, timeout or transport failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Endpoint answered with a non-success status
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// Status code
        status: u16,
        /// Response body (possibly shortened)
        body: String,
    },

    /// Response could not be decoded
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Response carried no completion
    #[error("empty response: {0}")]
    EmptyResponse(String),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

/// How generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    /// Natural stop
    Complete,
    /// Stopped by the generation budget
    Truncated,
}

/// Token accounting reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens (including media tokens)
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Generated tokens
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u64,
}

/// One call to the captioning capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    /// Media reference understood by the backend (a `file://` URL)
    pub media_url: String,
    /// Prompt text
    pub prompt: String,
    /// Generation budget in tokens
    pub max_tokens: u32,
}

/// Backend answer for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResponse {
    /// Generated text (may be empty)
    pub text: String,
    /// Completion status
    pub finish: FinishStatus,
    /// Token usage, when reported
    pub usage: Option<TokenUsage>,
}

/// Captioning capability
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    /// Generate text for one media reference
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError>;

    /// Model name, for logs
    fn model_name(&self) -> &str;
}

/// Prompt choice across truncation retries of the same item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptRetryPolicy {
    /// Reuse the prompt drawn for the first attempt
    #[default]
    Keep,
    /// Draw a fresh prompt for every attempt
    Reselect,
}

/// Accepted caption for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    /// Caption text, never empty
    pub text: String,
    /// Prompt used by the accepted attempt
    pub prompt: String,
    /// Attempts made
    pub attempts: u32,
    /// Usage of the accepted attempt
    pub usage: Option<TokenUsage>,
}

/// Why the gateway produced no caption
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Every attempt hit the generation budget
    #[error("output still truncated after {attempts} attempts")]
    TruncationRetriesExceeded {
        /// Attempts made
        attempts: u32,
    },

    /// The model stopped without producing text
    #[error("model returned an empty caption")]
    EmptyCaption,

    /// The backend failed
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl GatewayError {
    /// Failure ledger reason for this error
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::TruncationRetriesExceeded { .. } => FailureReason::TruncationRetriesExceeded,
            Self::EmptyCaption => FailureReason::EmptyCaption,
            Self::Inference(InferenceError::DecodeError(_)) => FailureReason::DecodeError,
            Self::Inference(other) => FailureReason::Other(other.to_string()),
        }
    }
}

/// Per-item inference policy around a [`CaptionBackend`]
pub struct InferenceGateway {
    backend: Arc<dyn CaptionBackend>,
    prompts: PromptSet,
    rng: Mutex<StdRng>,
    max_tokens: u32,
    max_retries_on_length: u32,
    retry_policy: PromptRetryPolicy,
}

impl InferenceGateway {
    /// Create a gateway with default budget and retry settings
    pub fn new(backend: Arc<dyn CaptionBackend>, prompts: PromptSet) -> Self {
        Self {
            backend,
            prompts,
            rng: Mutex::new(StdRng::from_entropy()),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_retries_on_length: DEFAULT_MAX_RETRIES_ON_LENGTH,
            retry_policy: PromptRetryPolicy::default(),
        }
    }

    /// Set the generation budget per call
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the attempt budget for truncated output (clamped to `1..=20`)
    pub fn with_max_retries_on_length(mut self, max_retries_on_length: u32) -> Self {
        self.max_retries_on_length = clamp_retries_on_length(max_retries_on_length);
        self
    }

    /// Set the prompt policy for retries
    pub fn with_retry_policy(mut self, policy: PromptRetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Seed prompt selection for reproducible runs
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Attempt budget for truncated output
    pub fn max_retries_on_length(&self) -> u32 {
        self.max_retries_on_length
    }

    /// Model name of the wrapped backend
    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    fn choose_prompt(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.prompts.choose(&mut *rng).to_string()
    }

    /// Caption one item
    pub async fn infer(&self, item: &WorkItem) -> Result<Caption, GatewayError> {
        let media_url = item.media_url();
        let first_prompt = self.choose_prompt();
        let backend = &self.backend;

        let outcome = attempt(
            self.max_retries_on_length,
            |attempt_no| {
                let prompt = if attempt_no == 1 || self.retry_policy == PromptRetryPolicy::Keep {
                    first_prompt.clone()
                } else {
                    self.choose_prompt()
                };
                let request = InferenceRequest {
                    media_url: media_url.clone(),
                    prompt,
                    max_tokens: self.max_tokens,
                };
                let identifier = item.identifier.as_str();
                async move {
                    let started = Instant::now();
                    let response = backend.generate(&request).await?;
                    let elapsed = started.elapsed();
                    crate::metrics::record_inference(elapsed, response.finish, response.usage);

                    debug!(
                        identifier,
                        attempt = attempt_no,
                        elapsed_ms = elapsed.as_millis() as u64,
                        finish = ?response.finish,
                        chars = response.text.chars().count(),
                        "Inference call returned"
                    );
                    if let Some(usage) = response.usage {
                        info!(
                            identifier,
                            input_tokens = usage.prompt_tokens,
                            output_tokens = usage.completion_tokens,
                            total_tokens = usage.total_tokens,
                            "Token usage"
                        );
                    }
                    if response.finish == FinishStatus::Truncated {
                        warn!(identifier, attempt = attempt_no, "Caption truncated by max_tokens limit");
                    }
                    Ok::<_, InferenceError>((request.prompt, response))
                }
            },
            |value: &(String, InferenceResponse)| value.1.finish == FinishStatus::Truncated,
        )
        .await?;

        match outcome {
            Attempted::Accepted {
                value: (prompt, response),
                attempts,
            } => {
                if response.text.trim().is_empty() {
                    return Err(GatewayError::EmptyCaption);
                }
                Ok(Caption {
                    text: response.text,
                    prompt,
                    attempts,
                    usage: response.usage,
                })
            }
            Attempted::Exhausted { attempts, .. } => {
                Err(GatewayError::TruncationRetriesExceeded { attempts })
            }
        }
    }
}
