//! Sequential, resumable run loop
//!
//! For every item in canonical order the loop either skips it (already in the
//! checkpoint), fails it immediately (media missing), or captions it through
//! the [`InferenceGateway`]. Each new caption is committed right away by
//! rewriting the result file in canonical order; each failure is appended to
//! the failure ledger. No per-item failure stops the loop. A shutdown request
//! cancels the in-flight call and leaves that item pending for the next run.
//!
//! ```text
//! Pending ──► Skipped
//!    │
//!    ├──────► Failed (missing_source)
//!    │
//!    └──► InFlight ──► Recorded
//!                  ├─► Failed
//!                  └─► Interrupted (stays pending)
//! ```

pub mod config;

use crate::gateway::InferenceGateway;
use crate::metrics::{self, OutcomeLabel};
use crate::output::{default_failure_path, FailureLedger, OrderedWriter};
use crate::resume::{load_checkpoint, CheckpointMap, ResumeError, RunLock};
use crate::shutdown::SharedShutdown;
use crate::{CaptionResult, FailureReason, WorkItem};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Errors that abort a run before or outside item processing
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Checkpoint could not be read or the run lock is held
    #[error("resume error: {0}")]
    ResumeError(#[from] ResumeError),
}

/// Terminal state of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Already checkpointed, nothing done
    Skipped,
    /// Caption committed to the result file
    Recorded {
        /// Inference attempts used
        attempts: u32,
    },
    /// No caption this run; a failure record was appended
    Failed(FailureReason),
    /// Shutdown cancelled the inference call; nothing was written
    Interrupted,
}

/// Totals for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Items in the index
    pub total: usize,
    /// Items skipped because they were already done
    pub skipped: usize,
    /// Items captioned in this run
    pub recorded: usize,
    /// Items that failed in this run
    pub failed: usize,
    /// Extra inference attempts spent on truncated output by recorded items
    pub truncation_retries: u32,
    /// Results committed in the result file at the end of the run
    pub committed: usize,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
    /// Result file
    pub result_path: PathBuf,
    /// Failure file
    pub failure_path: PathBuf,
}

impl RunSummary {
    fn tally(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Recorded { attempts } => {
                self.recorded += 1;
                self.truncation_retries += attempts.saturating_sub(1);
            }
            ItemOutcome::Failed(_) => self.failed += 1,
            ItemOutcome::Interrupted => self.interrupted = true,
        }
    }

    /// Items neither done before nor processed (only non-zero when interrupted)
    pub fn unvisited(&self) -> usize {
        self.total - self.skipped - self.recorded - self.failed
    }
}

/// Drives one captioning run over an ordered item list
pub struct Runner {
    gateway: InferenceGateway,
    writer: OrderedWriter,
    ledger: FailureLedger,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl Runner {
    /// Create a runner writing results to `result_path`
    ///
    /// Failures go to the sibling `<stem>.failures.jsonl` unless overridden.
    pub fn new(gateway: InferenceGateway, result_path: impl Into<PathBuf>) -> Self {
        let result_path = result_path.into();
        let failure_path = default_failure_path(&result_path);
        Self {
            gateway,
            writer: OrderedWriter::new(result_path),
            ledger: FailureLedger::new(failure_path),
            shutdown: None,
            progress: None,
        }
    }

    /// Override the failure file path
    pub fn with_failure_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger = FailureLedger::new(path);
        self
    }

    /// Stop once shutdown is requested, cancelling the in-flight call
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Advance `progress` once per visited item
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Result file path
    pub fn result_path(&self) -> &Path {
        self.writer.path()
    }

    /// Failure file path
    pub fn failure_path(&self) -> &Path {
        self.ledger.path()
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Process `items` in order
    ///
    /// Only startup problems (unreadable result file, lock held by another
    /// run) are returned as errors. Item failures end up in the failure file.
    pub async fn run(&self, items: &[WorkItem]) -> Result<RunSummary, RunError> {
        let mut lock = RunLock::open(self.writer.path())?;
        let _guard = lock.try_exclusive()?;

        let (mut checkpoint, report) = load_checkpoint(self.writer.path())?;
        if report.loaded > 0 {
            info!(
                already_done = report.loaded,
                "Found already processed items, skipping them"
            );
        }

        let canonical_order: Vec<String> = items.iter().map(|i| i.identifier.clone()).collect();
        let mut summary = RunSummary {
            total: items.len(),
            skipped: 0,
            recorded: 0,
            failed: 0,
            truncation_retries: 0,
            committed: checkpoint.len(),
            interrupted: false,
            result_path: self.writer.path().to_path_buf(),
            failure_path: self.ledger.path().to_path_buf(),
        };

        info!(
            items = items.len(),
            model = self.gateway.model_name(),
            result_file = %self.writer.path().display(),
            "Starting captioning run"
        );

        for (idx, item) in items.iter().enumerate() {
            if self.shutdown_requested() {
                warn!(
                    processed = idx,
                    remaining = items.len() - idx,
                    "Shutdown requested, stopping before next item"
                );
                summary.interrupted = true;
                break;
            }

            if let Some(pb) = &self.progress {
                pb.set_message(item.identifier.clone());
            }

            let outcome = self
                .process_item(item, idx + 1, items.len(), &mut checkpoint, &canonical_order)
                .await;
            summary.tally(&outcome);
            if outcome == ItemOutcome::Interrupted {
                warn!(
                    identifier = %item.identifier,
                    remaining = items.len() - idx,
                    "Shutdown requested, in-flight item left pending"
                );
                break;
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        summary.committed = checkpoint.len();
        info!(
            recorded = summary.recorded,
            truncation_retries = summary.truncation_retries,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted,
            result_file = %summary.result_path.display(),
            "Run finished"
        );
        Ok(summary)
    }

    async fn process_item(
        &self,
        item: &WorkItem,
        position: usize,
        total: usize,
        checkpoint: &mut CheckpointMap,
        canonical_order: &[String],
    ) -> ItemOutcome {
        let identifier = item.identifier.as_str();

        if checkpoint.contains_key(identifier) {
            debug!(identifier, position, total, "Skipping (already processed)");
            metrics::record_item_outcome(OutcomeLabel::Skipped);
            return ItemOutcome::Skipped;
        }

        if !item.source_ref.exists() {
            warn!(identifier, source = %item.source_ref.display(), "Source media not found");
            return self.fail(identifier, FailureReason::MissingSource);
        }

        info!(identifier, position, total, "Processing");
        let started = Instant::now();

        let inference = self.gateway.infer(item);
        let result = match &self.shutdown {
            Some(shutdown) => tokio::select! {
                result = inference => result,
                _ = shutdown.wait_for_shutdown() => return ItemOutcome::Interrupted,
            },
            None => inference.await,
        };

        let caption = match result {
            Ok(caption) => caption,
            Err(e) => {
                error!(identifier, error = %e, "Error processing item");
                return self.fail(identifier, e.failure_reason());
            }
        };

        let chars = caption.text.chars().count();
        checkpoint.insert(
            identifier.to_string(),
            CaptionResult {
                identifier: identifier.to_string(),
                text: caption.text,
            },
        );

        if let Err(e) = self.writer.flush(checkpoint, canonical_order) {
            // Keep memory in line with what is actually on disk
            checkpoint.shift_remove(identifier);
            error!(identifier, error = %e, "Failed to commit caption");
            return self.fail(identifier, FailureReason::WriteError(e.to_string()));
        }

        info!(
            identifier,
            elapsed_ms = started.elapsed().as_millis() as u64,
            attempts = caption.attempts,
            caption_chars = chars,
            "Completed"
        );
        metrics::record_item_outcome(OutcomeLabel::Recorded);
        ItemOutcome::Recorded {
            attempts: caption.attempts,
        }
    }

    fn fail(&self, identifier: &str, reason: FailureReason) -> ItemOutcome {
        self.ledger.record(identifier, &reason);
        metrics::record_failure(reason.label());
        metrics::record_item_outcome(OutcomeLabel::Failed);
        ItemOutcome::Failed(reason)
    }
}
