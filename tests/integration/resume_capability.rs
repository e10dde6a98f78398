//! Integration tests for resuming an interrupted run

use crate::support::{
    gateway, media_fixture, read_failures, read_results, result_ids, Reply, ScriptedBackend,
};
use caption_pipeline::output::default_failure_path;
use caption_pipeline::runner::Runner;
use caption_pipeline::shutdown::ShutdownCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_second_run_makes_no_calls_and_keeps_file_identical() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/short/a.mp4", "L1/short/b.mp4", "L2/long/c.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let first = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&first, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();
    assert_eq!(summary.recorded, 3);
    let after_first = std::fs::read(&result_file).unwrap();

    let second = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&second, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert!(second.calls().is_empty());
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.recorded, 0);
    assert_eq!(std::fs::read(&result_file).unwrap(), after_first);
}

#[tokio::test]
async fn test_resume_only_processes_missing_items() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4", "L1/c.mp4"]);
    let result_file = temp.path().join("captions.jsonl");
    std::fs::write(
        &result_file,
        "{\"video_name\": \"L1/b.mp4\", \"caption\": \"existing caption\"}\n",
    )
    .unwrap();

    let backend = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.recorded, 2);
    assert_eq!(backend.calls_for("b.mp4"), 0);

    let results = read_results(&result_file);
    assert_eq!(results[1].text, "existing caption");
    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4", "L1/b.mp4", "L1/c.mp4"]);
}

#[tokio::test]
async fn test_malformed_lines_are_ignored_and_item_reprocessed() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4"]);
    let result_file = temp.path().join("captions.jsonl");
    std::fs::write(
        &result_file,
        concat!(
            "{\"video_name\": \"L1/a.mp4\", \"caption\": \"kept\"}\n",
            "{\"video_name\": \"L1/b.mp4\", \"capt\n",
        ),
    )
    .unwrap();

    let backend = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.recorded, 1);
    assert_eq!(backend.calls_for("b.mp4"), 1);

    let contents = std::fs::read_to_string(&result_file).unwrap();
    assert!(!contents.contains("\"capt\n"));
    assert_eq!(read_results(&result_file)[1].text, "caption of b.mp4");
}

#[tokio::test]
async fn test_record_with_empty_caption_is_not_done() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4"]);
    let result_file = temp.path().join("captions.jsonl");
    std::fs::write(&result_file, "{\"video_name\": \"L1/a.mp4\", \"caption\": \"\"}\n").unwrap();

    let backend = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(summary.recorded, 1);
    assert_eq!(read_results(&result_file)[0].text, "caption of a.mp4");
}

#[tokio::test]
async fn test_shutdown_stops_between_items_and_resume_finishes() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4", "L1/c.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let shutdown = ShutdownCoordinator::shared();
    let backend = Arc::new(ScriptedBackend::new().shutdown_after(1, shutdown.clone()));
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .with_shutdown(shutdown)
        .run(index.items())
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.unvisited(), 2);
    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4"]);

    let backend = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.recorded, 2);
    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4", "L1/b.mp4", "L1/c.mp4"]);
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_call_and_item_stays_pending() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let shutdown = ShutdownCoordinator::shared();
    let backend = Arc::new(
        ScriptedBackend::new()
            .script("a.mp4", [Reply::Hang])
            .shutdown_after(1, shutdown.clone()),
    );
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        Runner::new(gateway(&backend, 3), &result_file)
            .with_shutdown(shutdown)
            .run(index.items()),
    )
    .await
    .expect("run should stop once shutdown is requested")
    .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.recorded, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.unvisited(), 2);
    assert_eq!(backend.calls_for("b.mp4"), 0);
    assert!(!result_file.exists());
    assert!(read_failures(&default_failure_path(&result_file)).is_empty());

    let backend = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();
    assert_eq!(summary.recorded, 2);
    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4", "L1/b.mp4"]);
}
