//! Integration tests for the run lock

use crate::support::{gateway, media_fixture, ScriptedBackend};
use caption_pipeline::resume::{ResumeError, RunLock};
use caption_pipeline::runner::{RunError, Runner};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_run_refuses_result_file_locked_by_another_run() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let mut held = RunLock::open(&result_file).unwrap();
    let _guard = held.try_exclusive().unwrap();

    let backend = Arc::new(ScriptedBackend::new());
    let result = Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await;

    assert!(matches!(
        result,
        Err(RunError::ResumeError(ResumeError::LockError(_)))
    ));
    assert!(backend.calls().is_empty());
    assert!(!result_file.exists());
}

#[tokio::test]
async fn test_lock_is_released_after_run() {
    let temp = TempDir::new().unwrap();
    let index = media_fixture(temp.path(), &["L1/a.mp4"]);
    let result_file = temp.path().join("captions.jsonl");

    let backend = Arc::new(ScriptedBackend::new());
    Runner::new(gateway(&backend, 3), &result_file)
        .run(index.items())
        .await
        .unwrap();

    let mut lock = RunLock::open(&result_file).unwrap();
    assert!(lock.try_exclusive().is_ok());
}
