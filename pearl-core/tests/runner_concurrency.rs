//! Auto-runner behaviour under concurrent callers.
//!
//! Advances inside one process serialize on the runner's lock; runners that
//! share only a store are kept honest by versioned writes.

use pearl_core::config::PearlConfig;
use pearl_core::error::{RunnerError, StoreError};
use pearl_core::pacing::Pacer;
use pearl_core::research::{Pipeline, ResearchEngine};
use pearl_core::runner::{STATE_KEY, StepOutcome};
use pearl_core::store::{BlobStore, LocalStore, MemoryStore};
use pearl_core::{AutoRunner, MockSearchProvider, MockTextGenerator, PearlError, RunnerStatus};
use serde_json::json;
use std::sync::Arc;

async fn seed_running(blobs: &dyn BlobStore, cursor: usize) {
    blobs
        .write_json(
            STATE_KEY,
            &json!({
                "status": "RUNNING",
                "cursor_index": cursor,
                "completed_codes": [],
                "errors": [],
                "last_run_at": ""
            }),
        )
        .await
        .unwrap();
}

fn is_conflict(err: &PearlError) -> bool {
    matches!(
        err,
        PearlError::Runner(RunnerError::CursorMismatch { .. })
            | PearlError::Store(StoreError::VersionConflict { .. })
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advances_are_not_lost() {
    let store = Arc::new(MemoryStore::new());
    seed_running(store.as_ref(), 5).await;
    let runner = Arc::new(AutoRunner::new(store));

    let a = tokio::spawn({
        let runner = Arc::clone(&runner);
        async move { runner.advance(true, Some("AA"), None).await }
    });
    let b = tokio::spawn({
        let runner = Arc::clone(&runner);
        async move { runner.advance(false, Some("BB"), None).await }
    });
    let mut cursors = vec![a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
    cursors.sort_unstable();
    assert_eq!(cursors, vec![6, 7]);

    let state = runner.state().await.unwrap();
    assert_eq!(state.cursor_index, 7);
    assert_eq!(state.completed_codes, vec!["AA".to_string()]);
    assert_eq!(state.errors.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_advances_count_exactly() {
    let store = Arc::new(MemoryStore::new());
    seed_running(store.as_ref(), 0).await;
    let runner = Arc::new(AutoRunner::new(store));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.advance(true, None, None).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(runner.state().await.unwrap().cursor_index, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_expected_cursor_admits_one_winner() {
    let store = Arc::new(MemoryStore::new());
    seed_running(store.as_ref(), 5).await;
    let runner = Arc::new(AutoRunner::new(store));

    let handles: Vec<_> = ["AA", "BB"]
        .into_iter()
        .map(|code| {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.advance(true, Some(code), Some(5)).await })
        })
        .collect();

    let mut won = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(cursor) => {
                assert_eq!(cursor, 6);
                won += 1;
            }
            Err(e) => {
                assert!(is_conflict(&e), "unexpected error: {e}");
                conflicts += 1;
            }
        }
    }
    assert_eq!((won, conflicts), (1, 1));
    assert_eq!(runner.state().await.unwrap().cursor_index, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runners_sharing_a_directory_admit_one_winner() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_running(&LocalStore::new(dir.path()), 5).await;

    // Each runner opens its own store on the directory, like two processes.
    let first = Arc::new(AutoRunner::new(Arc::new(LocalStore::new(dir.path()))));
    let second = Arc::new(AutoRunner::new(Arc::new(LocalStore::new(dir.path()))));

    let a = tokio::spawn({
        let runner = Arc::clone(&first);
        async move { runner.advance(true, Some("AA"), Some(5)).await }
    });
    let b = tokio::spawn({
        let runner = Arc::clone(&second);
        async move { runner.advance(true, Some("BB"), Some(5)).await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(is_conflict));

    // A fresh runner over the same directory sees the winner's write.
    let reader = AutoRunner::new(Arc::new(LocalStore::new(dir.path())));
    let state = reader.state().await.unwrap();
    assert_eq!(state.cursor_index, 6);
    assert_eq!(state.completed_codes.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runners_on_separate_stores_count_every_accepted_advance() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_running(&LocalStore::new(dir.path()), 0).await;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let runner = AutoRunner::new(Arc::new(LocalStore::new(dir.path())));
            tokio::spawn(async move {
                let mut accepted = 0usize;
                for _ in 0..10 {
                    match runner.advance(true, None, None).await {
                        Ok(_) => accepted += 1,
                        Err(e) => assert!(is_conflict(&e), "unexpected error: {e}"),
                    }
                }
                accepted
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        accepted += handle.await.unwrap();
    }

    let reader = AutoRunner::new(Arc::new(LocalStore::new(dir.path())));
    let state = reader.state().await.unwrap();
    assert!(accepted > 0);
    assert_eq!(state.cursor_index, accepted);
}

fn idle_pipeline(store: Arc<MemoryStore>) -> Pipeline {
    let config = PearlConfig::default();
    let engine = ResearchEngine::new(
        Arc::new(MockSearchProvider::new()),
        Arc::new(MockTextGenerator::new()),
        &config,
    )
    .with_pacing(Pacer::none(), Pacer::none());
    Pipeline::new(engine, store.clone(), store, &config)
}

#[tokio::test]
async fn test_step_runs_next_country_and_advances() {
    let store = Arc::new(MemoryStore::new());
    let runner = AutoRunner::new(store.clone());
    let pipeline = idle_pipeline(store.clone());

    let err = runner.step(&pipeline).await.unwrap_err();
    assert!(matches!(err, PearlError::Runner(RunnerError::NotRunning { .. })));

    runner.start(true).await.unwrap();
    let StepOutcome {
        country_code,
        cursor,
        report,
        error,
    } = runner.step(&pipeline).await.unwrap();
    assert_eq!(country_code, "GB");
    assert_eq!(cursor, 1);
    assert!(error.is_none());
    assert_eq!(report.unwrap().stats.candidates, 0);

    let status = runner.status().await.unwrap();
    assert_eq!(status.status, RunnerStatus::Running);
    assert_eq!(status.next_country.unwrap().code, "DE");
    assert_eq!(runner.state().await.unwrap().completed_codes, vec!["GB".to_string()]);
}
