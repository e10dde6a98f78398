//! Integration tests for per-item failures

use crate::support::{
    gateway, media_fixture, read_failures, result_ids, Reply, ScriptedBackend,
};
use caption_pipeline::output::default_failure_path;
use caption_pipeline::runner::Runner;
use caption_pipeline::WorkItem;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[tokio::test]
async fn test_failed_item_does_not_block_later_items() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4", "L1/c.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let backend = Arc::new(ScriptedBackend::new().script("b.mp4", [Reply::Unreachable]));
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(summary.recorded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4", "L1/c.mp4"]);

    let failures = read_failures(&default_failure_path(&result_file));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].identifier, "L1/b.mp4");
    assert!(failures[0].reason.contains("connection refused"));
    assert!(failures[0].failed_at.is_some());
}

#[tokio::test]
async fn test_truncation_budget_bounds_attempts() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let backend = Arc::new(
        ScriptedBackend::new().script("b.mp4", std::iter::repeat(Reply::Truncated).take(10)),
    );
    let summary = Runner::new(gateway(&backend, 2), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(backend.calls_for("b.mp4"), 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4"]);

    let failures = read_failures(&default_failure_path(&result_file));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].reason, "truncation_retries_exceeded");
}

#[tokio::test]
async fn test_truncation_followed_by_complete_output_is_recorded() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let backend = Arc::new(ScriptedBackend::new().script(
        "a.mp4",
        [Reply::Truncated, Reply::Complete("A full caption.".to_string())],
    ));
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(backend.calls_for("a.mp4"), 2);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.truncation_retries, 1);
    let contents = std::fs::read_to_string(&result_file).unwrap();
    assert!(contents.contains("A full caption."));
    assert!(!contents.contains("walks into the"));
}

#[tokio::test]
async fn test_missing_source_fails_without_inference() {
    let temp = TempDir::new().unwrap();
    let mut items = media_fixture(temp.path(), &["L1/a.mp4"]).items().to_vec();
    items.push(WorkItem::new(temp.path(), temp.path().join("L1/gone.mp4")));
    let result_file = temp.path().join("captions.jsonl");

    let backend = Arc::new(ScriptedBackend::new());
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(&items)
        .await
        .unwrap();

    assert_eq!(backend.calls_for("gone.mp4"), 0);
    assert_eq!(summary.failed, 1);

    let failures = read_failures(&default_failure_path(&result_file));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].identifier, "L1/gone.mp4");
    assert_eq!(failures[0].reason, "missing_source");
}

#[tokio::test]
async fn test_decode_and_empty_caption_reasons() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4"]);
    let result_file = temp.path().join("captions.jsonl");
    let failure_file = temp.path().join("failed.jsonl");

    let backend = Arc::new(
        ScriptedBackend::new()
            .script("a.mp4", [Reply::Undecodable])
            .script("b.mp4", [Reply::Complete("   ".to_string())]),
    );
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .with_failure_path(&failure_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.committed, 0);

    let reasons: Vec<String> = read_failures(&failure_file)
        .into_iter()
        .map(|f| f.reason)
        .collect();
    assert_eq!(reasons, vec!["decode_error", "empty_caption"]);
}

#[tokio::test]
async fn test_failure_records_append_across_runs() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    for _ in 0..2 {
        let backend = Arc::new(ScriptedBackend::new().script("a.mp4", [Reply::Unreachable]));
        Runner::new(gateway(&backend, 3), &result_file)
            .run(index.items())
            .await
            .unwrap();
    }

    let failures = read_failures(&default_failure_path(&result_file));
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.identifier == "L1/a.mp4"));
}

#[tokio::test]
async fn test_failed_commit_rolls_back_item_and_keeps_previous_file() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4", "L1/b.mp4", "L1/c.mp4"]);
    let result_file = temp.path().join("captions.jsonl");
    let parked = temp.path().join("captions.parked");
    let snapshot = Arc::new(Mutex::new(None::<String>));

    // While b is in flight the target path becomes a directory, so its commit
    // cannot rename over it; c puts the real file back before committing.
    let backend = Arc::new(
        ScriptedBackend::new()
            .on_call("b.mp4", {
                let (result_file, parked) = (result_file.clone(), parked.clone());
                move || {
                    std::fs::rename(&result_file, &parked).unwrap();
                    std::fs::create_dir(&result_file).unwrap();
                }
            })
            .on_call("c.mp4", {
                let (result_file, parked) = (result_file.clone(), parked.clone());
                let snapshot = snapshot.clone();
                move || {
                    *snapshot.lock().unwrap() = Some(std::fs::read_to_string(&parked).unwrap());
                    std::fs::remove_dir(&result_file).unwrap();
                    std::fs::rename(&parked, &result_file).unwrap();
                }
            }),
    );
    let summary = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    assert_eq!(summary.recorded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.committed, 2);

    let before_c = snapshot.lock().unwrap().clone().unwrap();
    assert_eq!(before_c.lines().count(), 1);
    assert!(before_c.contains("\"L1/a.mp4\""));

    assert_eq!(result_ids(&result_file), vec!["L1/a.mp4", "L1/c.mp4"]);

    let failures = read_failures(&default_failure_path(&result_file));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].identifier, "L1/b.mp4");
    assert!(failures[0].reason.starts_with("write_error: "));

    let mut names: Vec<String> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("captions") || name.starts_with(".tmp"))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["captions.failures.jsonl", "captions.jsonl", "captions.jsonl.lock"]
    );
}
