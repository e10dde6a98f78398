//! `run` command: caption every pending item

use crate::gateway::openai::{
    MediaKind, OpenAiBackend, OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL,
};
use crate::gateway::{InferenceGateway, PromptRetryPolicy, PromptSet};
use crate::runner::config::{DEFAULT_MAX_RETRIES_ON_LENGTH, DEFAULT_MAX_TOKENS};
use crate::runner::{RunSummary, Runner};
use crate::shutdown::SharedShutdown;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::commands::{Cli, ItemSourceArgs, OutputFormat};
use super::CliError;

/// Arguments for the `run` command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Item source
    #[command(flatten)]
    pub source: ItemSourceArgs,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// API key sent as bearer token
    #[arg(long, env = "OPENAI_API_KEY", default_value = "EMPTY", hide_env_values = true)]
    pub api_key: String,

    /// Generation budget per call
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Nucleus sampling
    #[arg(long, default_value_t = 1.0)]
    pub top_p: f32,

    /// Sampling seed; also seeds prompt selection
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Whole-request timeout in seconds
    #[arg(long, default_value_t = 3600)]
    pub request_timeout_secs: u64,

    /// Attempts per item while the caption is cut off by --max-tokens (range: 1-20)
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_RETRIES_ON_LENGTH,
        value_parser = clap::value_parser!(u32).range(1..=20)
    )]
    pub max_retries_on_length: u32,

    /// Draw a fresh prompt for each truncation retry
    #[arg(long, default_value_t = false)]
    pub reselect_prompt_on_retry: bool,

    /// Prompt file, one prompt per line
    #[arg(long)]
    pub prompts_file: Option<PathBuf>,

    /// Media content part type: video or image
    #[arg(long, default_value = "video")]
    pub media_kind: MediaKind,
}

impl RunArgs {
    fn prompt_set(&self) -> Result<PromptSet, CliError> {
        match &self.prompts_file {
            Some(path) => Ok(PromptSet::from_file(path)?),
            None => Ok(PromptSet::default()),
        }
    }

    fn backend_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            seed: Some(self.seed),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            media_kind: self.media_kind,
        }
    }

    fn retry_policy(&self) -> PromptRetryPolicy {
        if self.reselect_prompt_on_retry {
            PromptRetryPolicy::Reselect
        } else {
            PromptRetryPolicy::Keep
        }
    }

    /// Reject sampling settings the endpoint cannot honor
    pub fn validate(&self) -> Result<(), CliError> {
        if self.max_tokens == 0 {
            return Err(CliError::ConfigurationError(
                "--max-tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(CliError::ConfigurationError(format!(
                "--temperature must be within 0..=2, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(CliError::ConfigurationError(format!(
                "--top-p must be within (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }

    /// Execute the run command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        self.validate()?;
        let index = self.source.load_index()?;
        if index.is_empty() {
            return Err(CliError::InvalidArgument(
                "item source produced no items".to_string(),
            ));
        }

        let prompts = self.prompt_set()?;
        let backend = OpenAiBackend::new(self.backend_config())?;
        info!(
            endpoint = backend.endpoint(),
            prompts = prompts.len(),
            max_tokens = self.max_tokens,
            max_retries_on_length = self.max_retries_on_length,
            "Inference backend configured"
        );

        let gateway = InferenceGateway::new(Arc::new(backend), prompts)
            .with_max_tokens(self.max_tokens)
            .with_max_retries_on_length(self.max_retries_on_length)
            .with_retry_policy(self.retry_policy())
            .with_seed(self.seed);

        let mut runner = Runner::new(gateway, &cli.result_file)
            .with_failure_path(cli.failure_path())
            .with_shutdown(shutdown);

        let progress = match cli.output_format {
            OutputFormat::Human => Some(create_progress_bar(index.len() as u64)),
            OutputFormat::Json => None,
        };
        if let Some(pb) = &progress {
            runner = runner.with_progress(pb.clone());
        }

        let result = runner.run(index.items()).await;
        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        let summary = result?;

        match cli.output_format {
            OutputFormat::Json => output_json(&summary),
            OutputFormat::Human => output_human(&summary),
        }
        Ok(())
    }
}

fn output_json(summary: &RunSummary) {
    let output = serde_json::json!({
        "success": true,
        "total": summary.total,
        "skipped": summary.skipped,
        "recorded": summary.recorded,
        "failed": summary.failed,
        "truncation_retries": summary.truncation_retries,
        "committed": summary.committed,
        "unvisited": summary.unvisited(),
        "interrupted": summary.interrupted,
        "result_file": summary.result_path.display().to_string(),
        "failure_file": summary.failure_path.display().to_string(),
    });
    println!("{output}");
}

fn output_human(summary: &RunSummary) {
    if summary.interrupted {
        println!("Run interrupted");
    } else {
        println!("Run completed");
    }
    println!("  Items:     {}", summary.total);
    println!("  Recorded:  {}", summary.recorded);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Failed:    {}", summary.failed);
    if summary.truncation_retries > 0 {
        println!("  Truncation retries: {}", summary.truncation_retries);
    }
    if summary.interrupted {
        println!("  Remaining: {}", summary.unvisited());
    }
    println!("  Results:   {} ({} captions)", summary.result_path.display(), summary.committed);
    if summary.failed > 0 {
        println!("  Failures:  {}", summary.failure_path.display());
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
