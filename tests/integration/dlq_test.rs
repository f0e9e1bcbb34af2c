//! Integration tests for the dead-letter queue.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use queuectl_core::error::ErrorKind;
use queuectl_entity::{JobState, NewJob};
use queuectl_worker::CycleOutcome;

/// Submit a job with no retry budget and run it to failure.
async fn bury(app: &helpers::TestApp, id: &str) {
    let runner = Arc::new(helpers::ScriptedRunner::failing(1, 1));
    let worker = app.scripted_worker("burier", runner);
    app.queue
        .submit(NewJob::command("exit 1").with_id(id).with_max_retries(0))
        .await
        .unwrap();
    let outcome = worker.run_once().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Dead(_)));
}

#[tokio::test]
async fn test_retry_moves_job_back_to_pending() {
    let app = helpers::TestApp::new().await;
    bury(&app, "lazarus").await;

    let job = app.dlq.retry("lazarus").await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.retries, 0);
    assert_eq!(job.max_retries, 0);
    assert!(job.last_error.is_none());

    assert!(app.dlq.list(None).await.unwrap().is_empty());
    let pending = app.queue.list(Some(JobState::Pending), None).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, "lazarus");

    // It runs again like any other job.
    let worker = app.shell_worker("w1");
    let outcome = worker.run_once().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Dead(ref e) if e.job.id == "lazarus"));
}

#[tokio::test]
async fn test_ids_unique_across_queue_and_dlq() {
    let app = helpers::TestApp::new().await;
    bury(&app, "taken").await;

    let err = app
        .queue
        .submit(NewJob::command("true").with_id("taken"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateId);
    assert_eq!(app.dlq.list(None).await.unwrap().len(), 1);
    assert!(app.jobs.find_by_id("taken").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_list_is_newest_first_and_limited() {
    let app = helpers::TestApp::new().await;
    for id in ["old", "mid", "new"] {
        bury(&app, id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let ids: Vec<String> = app
        .dlq
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.job.id)
        .collect();
    assert_eq!(ids, ["new", "mid", "old"]);
    assert_eq!(app.dlq.list(Some(2)).await.unwrap().len(), 2);

    let dead = app.queue.list(Some(JobState::Dead), None).await.unwrap();
    assert!(dead.iter().all(|job| job.state == JobState::Dead));
    assert_eq!(dead.len(), 3);
}

#[tokio::test]
async fn test_manual_move_and_remove() {
    let app = helpers::TestApp::new().await;
    app.queue
        .submit(NewJob::command("sleep 100").with_id("stuck"))
        .await
        .unwrap();

    let entry = app.dlq.move_to_dlq("stuck", "operator gave up").await.unwrap();
    assert_eq!(entry.reason, "operator gave up");
    assert!(app.jobs.find_by_id("stuck").await.unwrap_err().is_not_found());
    assert_eq!(app.queue.get("stuck").await.unwrap().state, JobState::Dead);

    let stats = app.queue.stats().await.unwrap();
    assert_eq!(stats.dead, 1);
    assert_eq!(stats.pending, 0);

    app.dlq.remove("stuck").await.unwrap();
    assert!(app.dlq.get("stuck").await.unwrap_err().is_not_found());
    assert!(app.queue.get("stuck").await.unwrap_err().is_not_found());
    assert_eq!(
        app.dlq.remove("stuck").await.unwrap_err().kind,
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_retry_of_unknown_id_is_not_found() {
    let app = helpers::TestApp::new().await;
    let err = app.dlq.retry("nobody").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_stays_visible_while_being_buried() {
    let app = helpers::TestApp::new().await;
    let ids: Vec<String> = (0..40).map(|i| format!("doomed-{i:02}")).collect();
    for id in &ids {
        app.queue
            .submit(NewJob::command("exit 1").with_id(id.clone()).with_max_retries(0))
            .await
            .unwrap();
    }

    let runner = Arc::new(helpers::ScriptedRunner::failing(1, 40));
    let worker = app.scripted_worker("burier", runner);
    let burying = tokio::spawn(async move {
        for _ in 0..40 {
            worker.run_once().await.unwrap();
        }
    });

    while !burying.is_finished() {
        for id in &ids {
            let job = app.queue.get(id).await.unwrap();
            assert!(matches!(
                job.state,
                JobState::Pending | JobState::Processing | JobState::Dead
            ));
        }
        assert_eq!(app.queue.stats().await.unwrap().total(), 40);
    }
    burying.await.unwrap();

    let stats = app.queue.stats().await.unwrap();
    assert_eq!(stats.dead, 40);
    assert_eq!(stats.total(), 40);
}
