//! Integration tests for the lease protocol.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Barrier;

use queuectl_core::error::ErrorKind;
use queuectl_database::DatabasePool;
use queuectl_database::repositories::JobRepository;
use queuectl_entity::{JobState, NewJob};
use queuectl_worker::Acquire;

#[tokio::test]
async fn test_concurrent_claims_have_single_winner() {
    let app = helpers::TestApp::new().await;
    app.queue
        .submit(NewJob::command("true").with_id("contested"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let leases = app.leases.clone();
        handles.push(tokio::spawn(async move {
            leases
                .acquire("contested", Duration::from_secs(60))
                .await
                .unwrap()
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if let Acquire::Granted(lease) = handle.await.unwrap() {
            assert_eq!(lease.job.state, JobState::Processing);
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
}

#[tokio::test]
async fn test_expired_lease_is_recovered() {
    let app = helpers::TestApp::new().await;
    app.queue
        .submit(NewJob::command("true").with_id("crashy"))
        .await
        .unwrap();

    // First worker claims with a short lease and then "crashes".
    let Acquire::Granted(stale) = app
        .leases
        .acquire("crashy", Duration::from_millis(50))
        .await
        .unwrap()
    else {
        panic!("first claim should succeed");
    };
    assert_eq!(
        app.leases
            .acquire("crashy", Duration::from_secs(60))
            .await
            .unwrap(),
        Acquire::Busy
    );

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(app.jobs.claimable(10).await.unwrap().len(), 1);

    let Acquire::Granted(fresh) = app
        .leases
        .acquire("crashy", Duration::from_secs(60))
        .await
        .unwrap()
    else {
        panic!("expired lease should be reclaimable");
    };
    assert_ne!(fresh.token, stale.token);

    let done = app.leases.release_success(&fresh).await.unwrap();
    assert_eq!(done.state, JobState::Done);

    let err = app.leases.release_success(&stale).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::LeaseExpired);
    let err = app.leases.release_failure(&stale, "late").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::LeaseExpired);

    let job = app.queue.get("crashy").await.unwrap();
    assert_eq!(job.state, JobState::Done);
    assert_eq!(job.retries, 0);
    assert!(job.last_error.is_none());
}

#[tokio::test]
async fn test_report_after_expiry_without_reclaim_is_rejected() {
    let app = helpers::TestApp::new().await;
    app.queue
        .submit(NewJob::command("true").with_id("slow"))
        .await
        .unwrap();

    let Acquire::Granted(lease) = app
        .leases
        .acquire("slow", Duration::from_millis(30))
        .await
        .unwrap()
    else {
        panic!("claim should succeed");
    };
    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = app.leases.release_success(&lease).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::LeaseExpired);

    let job = app.queue.get("slow").await.unwrap();
    assert_eq!(job.state, JobState::Processing);
    assert!(job.is_claimable_at(chrono::Utc::now()));
}

#[tokio::test]
async fn test_reports_on_missing_jobs_are_not_found() {
    let app = helpers::TestApp::new().await;
    app.queue
        .submit(NewJob::command("true").with_id("gone"))
        .await
        .unwrap();
    let Acquire::Granted(lease) = app
        .leases
        .acquire("gone", Duration::from_secs(60))
        .await
        .unwrap()
    else {
        panic!("claim should succeed");
    };

    // Administrative delete ignores the lease.
    app.queue.delete("gone").await.unwrap();

    let err = app.leases.release_success(&lease).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_claimable_respects_schedule_and_order() {
    let app = helpers::TestApp::new().await;
    for id in ["first", "second", "third"] {
        app.queue.submit(NewJob::command("true").with_id(id)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    app.leases
        .acquire("second", Duration::from_secs(60))
        .await
        .unwrap();

    let ids: Vec<String> = app
        .jobs
        .claimable(10)
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(ids, ["first", "third"]);
    assert_eq!(app.jobs.claimable(1).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_across_separate_pools_have_single_winner() {
    let app = helpers::TestApp::new().await;

    // One pool per simulated worker process, all on the same database file.
    let mut stores = Vec::new();
    for _ in 0..8 {
        let db = DatabasePool::connect(&app.config.database).await.unwrap();
        stores.push(Arc::new(JobRepository::new(db.into_pool(), &app.config.queue)));
    }

    for round in 0..20 {
        let id = format!("race-{round:02}");
        app.queue
            .submit(NewJob::command("true").with_id(id.clone()))
            .await
            .unwrap();

        let barrier = Arc::new(Barrier::new(stores.len()));
        let mut handles = Vec::new();
        for store in &stores {
            let store = Arc::clone(store);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                store.try_claim(&id, Duration::from_secs(60)).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "round {round} had {winners} winners");
    }
}
