//! Pipeline metrics
//!
//! Counters and histograms are emitted through the `metrics` facade. Nothing
//! is exported unless [`init_metrics`] installs the Prometheus exporter; until
//! then every call is a cheap no-op.

use crate::gateway::{FinishStatus, TokenUsage};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Item outcome label used by [`record_item_outcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeLabel {
    /// Already checkpointed
    Skipped,
    /// Caption committed
    Recorded,
    /// Failure recorded
    Failed,
}

impl OutcomeLabel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Recorded => "recorded",
            Self::Failed => "failed",
        }
    }
}

/// Install the Prometheus exporter on `addr`
///
/// Must be called from within a tokio runtime. Calling it again is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "caption_items_total",
        Unit::Count,
        "Items visited by the run loop, by outcome"
    );
    describe_counter!(
        "caption_failures_total",
        Unit::Count,
        "Failure records appended, by reason"
    );
    describe_counter!(
        "caption_inference_attempts_total",
        Unit::Count,
        "Calls made to the captioning backend"
    );
    describe_counter!(
        "caption_truncations_total",
        Unit::Count,
        "Backend calls that stopped at the token budget"
    );
    describe_counter!(
        "caption_tokens_total",
        Unit::Count,
        "Tokens reported by the backend, by kind"
    );
    describe_histogram!(
        "caption_inference_duration_seconds",
        Unit::Seconds,
        "Latency of a single backend call"
    );

    let _ = METRICS_ADDR.set(addr);
    info!(addr = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one backend call
pub fn record_inference(duration: Duration, finish: FinishStatus, usage: Option<TokenUsage>) {
    counter!("caption_inference_attempts_total").increment(1);
    histogram!("caption_inference_duration_seconds").record(duration.as_secs_f64());
    if finish == FinishStatus::Truncated {
        counter!("caption_truncations_total").increment(1);
    }
    if let Some(usage) = usage {
        counter!("caption_tokens_total", "kind" => "prompt").increment(usage.prompt_tokens);
        counter!("caption_tokens_total", "kind" => "completion").increment(usage.completion_tokens);
    }
}

/// Record the terminal state of one item
pub fn record_item_outcome(outcome: OutcomeLabel) {
    counter!("caption_items_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record one failure ledger entry
pub fn record_failure(reason: &'static str) {
    counter!("caption_failures_total", "reason" => reason).increment(1);
}
