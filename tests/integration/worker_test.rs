//! Integration tests for workers running concurrently and shutting down.

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use queuectl_core::config::AppConfig;
use queuectl_database::DatabasePool;
use queuectl_entity::{JobState, NewJob};
use queuectl_worker::{CycleOutcome, WorkerPhase, WorkerPool};

#[tokio::test]
async fn test_pool_runs_every_job_exactly_once() {
    let app = helpers::TestApp::new().await;
    for i in 0..24 {
        app.queue
            .submit(NewJob::command("true").with_id(format!("job-{i:02}")))
            .await
            .unwrap();
    }

    let runner = Arc::new(
        helpers::ScriptedRunner::succeeding().with_delay(Duration::from_millis(10)),
    );
    let pool = Arc::new(WorkerPool::new(
        app.db.pool().clone(),
        &app.config,
        4,
        runner.clone(),
    ));

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.run(rx).await }
    });

    let queue = &app.queue;
    let finished = app
        .wait_until(Duration::from_secs(10), || async move {
            queue.stats().await.unwrap().done == 24
        })
        .await;
    assert!(finished, "workers did not drain the queue");

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    let runs = runner.all_runs();
    assert_eq!(runs.len(), 24);
    assert!(runs.values().all(|&n| n == 1), "duplicate execution: {runs:?}");
    assert!(pool.runners().iter().all(|r| r.phase() == WorkerPhase::Stopped));
}

#[tokio::test]
async fn test_execution_timeout_counts_as_failure() {
    let mut config = AppConfig::default();
    config.worker.execution_timeout_seconds = 1;
    config.worker.lease_duration_seconds = 30;
    config.queue.backoff_max_seconds = 0.0;
    let app = helpers::TestApp::with_config(config).await;
    let worker = app.shell_worker("w1");

    app.queue
        .submit(NewJob::command("sleep 10").with_id("sleepy").with_max_retries(0))
        .await
        .unwrap();

    let started = Instant::now();
    let outcome = worker.run_once().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let CycleOutcome::Dead(entry) = outcome else {
        panic!("timed-out job should be buried, got {outcome:?}");
    };
    assert!(entry.reason.contains("timed out"), "{}", entry.reason);
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_job_finish() {
    let app = helpers::TestApp::new().await;
    let worker = Arc::new(app.shell_worker("w1"));
    app.queue
        .submit(NewJob::command("sleep 0.3").with_id("short"))
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    let mut phases = worker.phase_watch();
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        phases.wait_for(|phase| *phase == WorkerPhase::Executing),
    )
    .await
    .unwrap()
    .unwrap();
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.queue.get("short").await.unwrap().state, JobState::Done);
}

#[tokio::test]
async fn test_shutdown_abandons_job_after_grace() {
    let mut config = AppConfig::default();
    config.worker.shutdown_grace_seconds = 0;
    config.worker.poll_interval_ms = 20;
    let app = helpers::TestApp::with_config(config).await;
    let worker = Arc::new(app.shell_worker("w1"));
    app.queue
        .submit(NewJob::command("sleep 30").with_id("long"))
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    let mut phases = worker.phase_watch();
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        phases.wait_for(|phase| *phase == WorkerPhase::Executing),
    )
    .await
    .unwrap()
    .unwrap();

    let started = Instant::now();
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    // The lease is left to expire; nothing was reported.
    let job = app.queue.get("long").await.unwrap();
    assert_eq!(job.state, JobState::Processing);
    assert!(job.lease_active_at(chrono::Utc::now()));
    assert_eq!(job.retries, 0);
}

#[tokio::test]
async fn test_two_workers_never_share_a_job() {
    let app = helpers::TestApp::new().await;
    let runner = Arc::new(
        helpers::ScriptedRunner::succeeding().with_delay(Duration::from_millis(50)),
    );
    let a = app.scripted_worker("a", runner.clone());
    let b = app.scripted_worker("b", runner.clone());

    app.queue
        .submit(NewJob::command("true").with_id("only"))
        .await
        .unwrap();

    let (first, second) = tokio::join!(a.run_once(), b.run_once());
    let outcomes = [first.unwrap(), second.unwrap()];
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, CycleOutcome::Completed(_)))
        .count();
    assert_eq!(completed, 1);
    assert!(outcomes.contains(&CycleOutcome::Idle));
    assert_eq!(runner.runs_of("only"), 1);
}

#[tokio::test]
async fn test_shutdown_during_claim_starts_no_new_job() {
    let app = helpers::TestApp::new().await;
    let runner = Arc::new(helpers::ScriptedRunner::succeeding());
    let worker = Arc::new(app.scripted_worker("w1", runner.clone()));
    app.queue
        .submit(NewJob::command("true").with_id("late"))
        .await
        .unwrap();

    // Another process holds the write lock, so the worker's claim blocks.
    let other = DatabasePool::connect(&app.config.database).await.unwrap();
    let mut conn = other.pool().acquire().await.unwrap();
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    let mut phases = worker.phase_watch();
    let handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run(rx).await }
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        phases.wait_for(|phase| *phase == WorkerPhase::Polling),
    )
    .await
    .unwrap()
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(worker.phase(), WorkerPhase::Polling);

    tx.send(true).unwrap();
    sqlx::query("COMMIT").execute(&mut *conn).await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(worker.phase(), WorkerPhase::Stopped);
    assert_eq!(runner.runs_of("late"), 0);

    let job = app.queue.get("late").await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.retries, 0);
    assert!(job.lease_token.is_none());
}
