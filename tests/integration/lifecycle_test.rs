//! Integration tests for the job lifecycle: submission, execution, retry and
//! burial.

mod helpers;

use std::sync::Arc;

use queuectl_core::config::QueueConfig;
use queuectl_core::error::ErrorKind;
use queuectl_entity::{JobState, NewJob};
use queuectl_worker::{CycleOutcome, JobQueue};

#[tokio::test]
async fn test_exit_zero_job_completes() {
    let app = helpers::TestApp::new().await;
    let worker = app.shell_worker("w1");

    let job = app.queue.submit(NewJob::command("exit 0")).await.unwrap();
    assert_eq!(job.state, JobState::Pending);

    let outcome = worker.run_once().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed(ref j) if j.id == job.id));

    let done = app.queue.get(&job.id).await.unwrap();
    assert_eq!(done.state, JobState::Done);
    assert!(done.locked_until.is_none());
    assert!(app.dlq.list(None).await.unwrap().is_empty());
    assert_eq!(worker.run_once().await.unwrap(), CycleOutcome::Idle);
}

#[tokio::test]
async fn test_failing_job_with_two_retries_dies_on_third_run() {
    let app = helpers::TestApp::new().await;
    let worker = app.shell_worker("w1");

    let job = app
        .queue
        .submit(NewJob::command("exit 1").with_id("failing").with_max_retries(2))
        .await
        .unwrap();
    assert_eq!(job.retries, 0);

    let mut states = Vec::new();
    let mut retries = vec![job.retries];
    for _ in 0..3 {
        match worker.run_once().await.unwrap() {
            CycleOutcome::Retrying(job) => {
                states.push(job.state);
                retries.push(job.retries);
            }
            CycleOutcome::Dead(entry) => {
                states.push(entry.job.state);
                assert_eq!(entry.job.retries, 2);
                assert_eq!(
                    entry.reason,
                    "Max retries (2) exceeded. Last error: exit code 1"
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(states, [JobState::Pending, JobState::Pending, JobState::Dead]);
    assert_eq!(retries, [0, 1, 2]);

    let err = app.jobs.find_by_id("failing").await.unwrap_err();
    assert!(err.is_not_found());
    let dead = app.dlq.list(None).await.unwrap();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].job.id, "failing");
}

#[tokio::test]
async fn test_zero_retry_budget_goes_straight_to_dlq() {
    let app = helpers::TestApp::new().await;
    let runner = Arc::new(helpers::ScriptedRunner::failing(2, 1));
    let worker = app.scripted_worker("w1", runner.clone());

    app.queue
        .submit(NewJob::command("anything").with_id("once").with_max_retries(0))
        .await
        .unwrap();

    let outcome = worker.run_once().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Dead(_)));
    assert_eq!(runner.runs_of("once"), 1);

    let stats = app.queue.stats().await.unwrap();
    assert_eq!(stats.dead, 1);
    assert_eq!(stats.pending + stats.processing + stats.done, 0);
}

#[tokio::test]
async fn test_retries_never_exceed_budget() {
    let app = helpers::TestApp::new().await;
    let runner = Arc::new(helpers::ScriptedRunner::failing(1, 100));
    let worker = app.scripted_worker("w1", runner.clone());

    for max in [0u32, 1, 3, 5] {
        app.queue
            .submit(NewJob::command("x").with_id(format!("job-{max}")).with_max_retries(max))
            .await
            .unwrap();
    }

    loop {
        let outcome = worker.run_once().await.unwrap();
        for job in app.queue.list(None, None).await.unwrap() {
            assert!(
                job.retries <= job.max_retries,
                "{} has {} retries of {}",
                job.id,
                job.retries,
                job.max_retries
            );
        }
        if outcome == CycleOutcome::Idle {
            break;
        }
    }

    for max in [0u32, 1, 3, 5] {
        let id = format!("job-{max}");
        assert_eq!(runner.runs_of(&id), max as usize + 1);
        let entry = app.dlq.get(&id).await.unwrap();
        assert_eq!(entry.job.retries, max);
    }
}

#[tokio::test]
async fn test_failure_after_success_script_completes() {
    let app = helpers::TestApp::new().await;
    let runner = Arc::new(helpers::ScriptedRunner::with_exit_codes([7]));
    let worker = app.scripted_worker("w1", runner.clone());

    app.queue
        .submit(NewJob::command("flaky").with_id("flaky"))
        .await
        .unwrap();

    let CycleOutcome::Retrying(job) = worker.run_once().await.unwrap() else {
        panic!("first run should be retried");
    };
    assert_eq!(job.last_error.as_deref(), Some("exit code 7: scripted failure 7"));

    let CycleOutcome::Completed(job) = worker.run_once().await.unwrap() else {
        panic!("second run should complete");
    };
    assert_eq!(job.retries, 1);
    assert_eq!(job.state, JobState::Done);
}

#[tokio::test]
async fn test_config_change_does_not_touch_existing_jobs() {
    let app = helpers::TestApp::new().await;
    let before = app.queue.submit(NewJob::command("true")).await.unwrap();
    assert_eq!(before.max_retries, 3);

    let reconfigured = JobQueue::new(
        Arc::clone(&app.jobs),
        Arc::new(queuectl_database::repositories::DeadLetterRepository::new(
            app.db.pool().clone(),
        )),
        QueueConfig {
            max_retries: 9,
            ..QueueConfig::default()
        },
    );
    let after = reconfigured.submit(NewJob::command("true")).await.unwrap();

    assert_eq!(after.max_retries, 9);
    assert_eq!(app.queue.get(&before.id).await.unwrap().max_retries, 3);
}

#[tokio::test]
async fn test_duplicate_and_invalid_submissions() {
    let app = helpers::TestApp::new().await;
    app.queue
        .submit(NewJob::command("true").with_id("same"))
        .await
        .unwrap();

    let err = app
        .queue
        .submit(NewJob::command("false").with_id("same"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateId);

    let err = app.queue.submit(NewJob::command("")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
