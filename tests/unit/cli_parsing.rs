//! Unit tests for command line parsing

use caption_pipeline::cli::{Cli, CliError, Commands, OutputFormat};
use caption_pipeline::gateway::openai::MediaKind;
use clap::Parser;
use std::path::PathBuf;

fn run_args(extra: &[&str]) -> Vec<String> {
    let mut args: Vec<String> = ["caption-pipeline", "run", "--root", "/data", "--manifest", "m.json"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

#[test]
fn test_run_defaults() {
    let cli = Cli::parse_from(run_args(&[]));

    assert_eq!(cli.result_file, PathBuf::from("captions.jsonl"));
    assert_eq!(cli.failure_path(), PathBuf::from("captions.failures.jsonl"));
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(cli.metrics_addr.is_none());

    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.source.media_field, "video");
    assert_eq!(args.max_tokens, 4096);
    assert_eq!(args.max_retries_on_length, 3);
    assert_eq!(args.seed, 42);
    assert_eq!(args.request_timeout_secs, 3600);
    assert_eq!(args.base_url, "http://localhost:8000/v1");
    assert_eq!(args.media_kind, MediaKind::Video);
    assert!(!args.reselect_prompt_on_retry);
}

#[test]
fn test_global_options_after_subcommand() {
    let cli = Cli::parse_from(run_args(&[
        "--result-file",
        "out/qwen.jsonl",
        "--output-format",
        "json",
        "--metrics-addr",
        "127.0.0.1:9100",
    ]));

    assert_eq!(cli.result_file, PathBuf::from("out/qwen.jsonl"));
    assert_eq!(cli.failure_path(), PathBuf::from("out/qwen.failures.jsonl"));
    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.metrics_addr.unwrap().port(), 9100);
}

#[test]
fn test_max_retries_on_length_range() {
    assert!(Cli::try_parse_from(run_args(&["--max-retries-on-length", "0"])).is_err());
    assert!(Cli::try_parse_from(run_args(&["--max-retries-on-length", "21"])).is_err());

    let cli = Cli::parse_from(run_args(&["--max-retries-on-length", "20"]));
    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.max_retries_on_length, 20);
}

#[test]
fn test_manifest_conflicts_with_scan_groups() {
    let result = Cli::try_parse_from(run_args(&["--scan-groups", "L1/short"]));
    assert!(result.is_err());
}

#[test]
fn test_status_with_scan_groups() {
    let cli = Cli::parse_from([
        "caption-pipeline",
        "status",
        "--root",
        "/data",
        "--scan-groups",
        "L1/short,L1/medium,L1/long",
        "--extension",
        "mkv",
    ]);

    let Commands::Status(args) = cli.command else {
        panic!("expected status command");
    };
    assert_eq!(args.source.scan_groups, vec!["L1/short", "L1/medium", "L1/long"]);
    assert_eq!(args.source.extension, "mkv");
    assert!(args.source.manifest.is_none());
}

#[test]
fn test_failure_file_override() {
    let cli = Cli::parse_from(run_args(&["--failure-file", "/tmp/failed.jsonl"]));
    assert_eq!(cli.failure_path(), PathBuf::from("/tmp/failed.jsonl"));
}

#[test]
fn test_media_kind_and_retry_policy_flags() {
    let cli = Cli::parse_from(run_args(&["--media-kind", "image", "--reselect-prompt-on-retry"]));
    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.media_kind, MediaKind::Image);
    assert!(args.reselect_prompt_on_retry);
}

#[test]
fn test_sampling_settings_are_validated() {
    let parse = |extra: &[&str]| {
        let Commands::Run(args) = Cli::parse_from(run_args(extra)).command else {
            panic!("expected run command");
        };
        args
    };

    assert!(parse(&[]).validate().is_ok());
    for bad in [
        &["--max-tokens", "0"][..],
        &["--temperature", "3.5"][..],
        &["--top-p", "0"][..],
    ] {
        assert!(matches!(
            parse(bad).validate(),
            Err(CliError::ConfigurationError(_))
        ));
    }
}
