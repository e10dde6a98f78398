//! `status` command: report progress of a result file against the item index

use crate::resume::load_checkpoint;
use clap::Args;
use std::path::Path;

use super::commands::{Cli, ItemSourceArgs, OutputFormat};
use super::CliError;

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Item source
    #[command(flatten)]
    pub source: ItemSourceArgs,
}

/// Progress of one result file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Items in the index
    pub total: usize,
    /// Indexed items with a caption
    pub done: usize,
    /// Indexed items without a caption
    pub pending: usize,
    /// Captions whose identifier is not in the index
    pub orphaned: usize,
    /// Unparsable result lines
    pub malformed: usize,
    /// Result lines without a caption
    pub incomplete: usize,
    /// Lines in the failure file
    pub failure_records: usize,
}

impl StatusArgs {
    /// Compute the report without touching the result file
    pub fn report(&self, cli: &Cli) -> Result<StatusReport, CliError> {
        let index = self.source.load_index()?;
        let (checkpoint, load) = load_checkpoint(&cli.result_file)?;

        let done = index
            .items()
            .iter()
            .filter(|item| checkpoint.contains_key(&item.identifier))
            .count();

        Ok(StatusReport {
            total: index.len(),
            done,
            pending: index.len() - done,
            orphaned: checkpoint.len() - done,
            malformed: load.malformed,
            incomplete: load.incomplete,
            failure_records: count_lines(&cli.failure_path()),
        })
    }

    /// Execute the status command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let report = self.report(cli)?;
        match cli.output_format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "result_file": cli.result_file.display().to_string(),
                    "total": report.total,
                    "done": report.done,
                    "pending": report.pending,
                    "orphaned": report.orphaned,
                    "malformed": report.malformed,
                    "incomplete": report.incomplete,
                    "failure_records": report.failure_records,
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                println!("Result file: {}", cli.result_file.display());
                println!("  Done:      {}/{}", report.done, report.total);
                println!("  Pending:   {}", report.pending);
                if report.orphaned > 0 {
                    println!("  Orphaned:  {}", report.orphaned);
                }
                if report.malformed + report.incomplete > 0 {
                    println!(
                        "  Skipped lines: {} malformed, {} incomplete",
                        report.malformed, report.incomplete
                    );
                }
                println!("  Failure records: {}", report.failure_records);
            }
        }
        Ok(())
    }
}

fn count_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|contents| contents.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}
