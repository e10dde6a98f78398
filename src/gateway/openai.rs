//! OpenAI-compatible chat-completions backend
//!
//! Targets servers such as vLLM that accept media as URL content parts. The
//! media is referenced by a `file://` URL, so the server must be able to read
//! the dataset from the same filesystem.

use super::{
    CaptionBackend, FinishStatus, InferenceError, InferenceRequest, InferenceResponse, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default endpoint base URL (local vLLM server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

/// Default model name
pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-VL-30B-A3B-Instruct";

/// Default request timeout; long videos can take many minutes to caption
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);

/// HTTP connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body kept in [`InferenceError::HttpError`]
const MAX_ERROR_BODY_CHARS: usize = 500;

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Kind of media content part sent to the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaKind {
    /// `video_url` content part
    #[default]
    Video,
    /// `image_url` content part
    Image,
}

impl MediaKind {
    fn content_type(&self) -> &'static str {
        match self {
            Self::Video => "video_url",
            Self::Image => "image_url",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "image" => Ok(Self::Image),
            _ => Err(format!("Invalid media kind: {s}. Valid options: video, image")),
        }
    }
}

/// Endpoint and sampling configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `http://localhost:8000/v1`
    pub base_url: String,
    /// Model name sent with each request
    pub model: String,
    /// Bearer token
    pub api_key: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Sampling seed
    pub seed: Option<u64>,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Media content part type
    pub media_kind: MediaKind,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: "EMPTY".to_string(),
            temperature: 0.0,
            top_p: 1.0,
            seed: Some(42),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            media_kind: MediaKind::Video,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
    endpoint: String,
}

impl OpenAiBackend {
    /// Build the HTTP client for `config`
    pub fn new(config: OpenAiConfig) -> Result<Self, InferenceError> {
        if config.model.trim().is_empty() {
            return Err(InferenceError::Backend("model name is required".to_string()));
        }
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::Backend(format!("Failed to build HTTP client: {e}")))?;
        let endpoint = format!(
            "{}/{CHAT_COMPLETIONS_PATH}",
            config.base_url.trim_end_matches('/')
        );

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Full chat-completions URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn payload(&self, request: &InferenceRequest) -> Value {
        let kind = self.config.media_kind.content_type();
        let mut payload = json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": kind, kind: { "url": request.media_url } },
                    { "type": "text", "text": request.prompt },
                ],
            }],
            "max_tokens": request.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
        });
        if let Some(seed) = self.config.seed {
            payload["seed"] = json!(seed);
        }
        payload
    }
}

/// Decode a chat-completions response body
fn parse_completion(body: &str) -> Result<InferenceResponse, InferenceError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::DecodeError(format!("Invalid completion JSON: {e}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::EmptyResponse("response had no choices".to_string()))?;

    let finish = match choice.finish_reason.as_deref() {
        Some("length") => FinishStatus::Truncated,
        _ => FinishStatus::Complete,
    };
    let text = choice.message.and_then(|m| m.content).unwrap_or_default();

    Ok(InferenceResponse {
        text,
        finish,
        usage: parsed.usage,
    })
}

fn shorten(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{head}...")
    }
}

#[async_trait]
impl CaptionBackend for OpenAiBackend {
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        debug!(
            endpoint = %self.endpoint,
            model = %self.config.model,
            media_url = %request.media_url,
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_decode() {
                InferenceError::DecodeError(e.to_string())
            } else {
                InferenceError::NetworkError(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: shorten(&body),
            });
        }

        parse_completion(&body)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
