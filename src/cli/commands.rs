//! Command line definition shared by all subcommands

use crate::index::{ItemIndex, DEFAULT_MEDIA_FIELD};
use crate::output::default_failure_path;
use crate::runner::config::DEFAULT_RESULT_FILE;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use super::CliError;

/// Caption Pipeline CLI
#[derive(Parser, Debug)]
#[command(name = "caption-pipeline")]
#[command(about = "Resumable batch captioning of media collections", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// JSON-lines result file (also the checkpoint)
    #[arg(long, global = true, default_value = DEFAULT_RESULT_FILE)]
    pub result_file: PathBuf,

    /// JSON-lines failure file (default: <result stem>.failures.jsonl)
    #[arg(long, global = true)]
    pub failure_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Failure file path, explicit or derived from the result file
    pub fn failure_path(&self) -> PathBuf {
        self.failure_file
            .clone()
            .unwrap_or_else(|| default_failure_path(&self.result_file))
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Caption every pending item
    Run(super::run::RunArgs),

    /// Show done/pending counts without calling the model
    Status(super::status::StatusArgs),
}

/// Where the work items come from
#[derive(Args, Debug, Clone)]
pub struct ItemSourceArgs {
    /// Dataset root; identifiers are paths relative to it
    #[arg(long)]
    pub root: PathBuf,

    /// JSON manifest listing groups and items
    #[arg(long, conflicts_with = "scan_groups")]
    pub manifest: Option<PathBuf>,

    /// Manifest field holding the media file name
    #[arg(long, default_value = DEFAULT_MEDIA_FIELD)]
    pub media_field: String,

    /// Scan these subdirectories of --root in order (e.g. L1/short,L1/medium)
    #[arg(long, value_delimiter = ',')]
    pub scan_groups: Vec<String>,

    /// File extension matched when scanning
    #[arg(long, default_value = "mp4")]
    pub extension: String,
}

impl ItemSourceArgs {
    /// Build the item index from the manifest or the directory layout
    pub fn load_index(&self) -> Result<ItemIndex, CliError> {
        match &self.manifest {
            Some(manifest) => Ok(ItemIndex::from_manifest(
                manifest,
                &self.root,
                &self.media_field,
            )?),
            None if !self.scan_groups.is_empty() => Ok(ItemIndex::scan_layout(
                &self.root,
                self.scan_groups.as_slice(),
                &self.extension,
            )?),
            None => Err(CliError::InvalidArgument(
                "either --manifest or --scan-groups is required".to_string(),
            )),
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}
