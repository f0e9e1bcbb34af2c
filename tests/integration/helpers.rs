//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use queuectl_core::backoff::BackoffPolicy;
use queuectl_core::config::{AppConfig, DatabaseConfig};
use queuectl_database::DatabasePool;
use queuectl_database::repositories::{DeadLetterRepository, JobRepository};
use queuectl_entity::job::Job;
use queuectl_worker::{
    CommandRunner, DlqManager, ExecutionReport, JobExecutionError, JobExecutor, JobQueue,
    LeaseManager, WorkerRunner,
};

/// Test application context backed by a throwaway SQLite file
pub struct TestApp {
    /// Keeps the database directory alive for the test's duration
    pub dir: TempDir,
    /// Database pool for direct queries
    pub db: DatabasePool,
    /// Application config
    pub config: AppConfig,
    /// Job store
    pub jobs: Arc<JobRepository>,
    /// Lease manager
    pub leases: Arc<LeaseManager>,
    /// Submission facade
    pub queue: JobQueue,
    /// DLQ manager
    pub dlq: DlqManager,
}

impl TestApp {
    /// Create a new test application with immediate retries
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.queue.backoff_max_seconds = 0.0;
        config.worker.poll_interval_ms = 20;
        config.worker.shutdown_grace_seconds = 5;
        Self::with_config(config).await
    }

    /// Create a test application from an explicit config
    pub async fn with_config(mut config: AppConfig) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        config.database = DatabaseConfig::at(dir.path().join("queuectl.db"));

        let db = DatabasePool::connect(&config.database)
            .await
            .expect("Failed to open test database");

        let jobs = Arc::new(JobRepository::new(db.pool().clone(), &config.queue));
        let dead_letters = Arc::new(DeadLetterRepository::new(db.pool().clone()));
        let leases = Arc::new(LeaseManager::new(
            Arc::clone(&jobs),
            BackoffPolicy::from(&config.queue),
        ));
        let queue = JobQueue::new(
            Arc::clone(&jobs),
            Arc::clone(&dead_letters),
            config.queue.clone(),
        );
        let dlq = DlqManager::new(dead_letters);

        Self {
            dir,
            db,
            config,
            jobs,
            leases,
            queue,
            dlq,
        }
    }

    /// A worker that runs commands through the real shell
    pub fn shell_worker(&self, id: &str) -> WorkerRunner {
        self.worker(id, JobExecutor::shell(self.config.worker.execution_timeout()))
    }

    /// A worker that runs commands through `runner`
    pub fn scripted_worker(&self, id: &str, runner: Arc<dyn CommandRunner>) -> WorkerRunner {
        self.worker(
            id,
            JobExecutor::new(runner, self.config.worker.execution_timeout()),
        )
    }

    fn worker(&self, id: &str, executor: JobExecutor) -> WorkerRunner {
        WorkerRunner::new(
            Arc::clone(&self.jobs),
            Arc::clone(&self.leases),
            Arc::new(executor),
            self.config.worker.clone(),
            id.to_string(),
        )
    }

    /// Poll `check` until it returns true or the timeout elapses
    pub async fn wait_until<F, Fut>(&self, timeout: Duration, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check().await
    }
}

/// Command runner that replays scripted exit codes and records every run
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    /// Exit codes handed out in order; exhausted scripts exit 0
    exit_codes: Mutex<VecDeque<i32>>,
    /// Number of runs per job id
    runs: Mutex<HashMap<String, usize>>,
    /// Simulated run time
    delay: Duration,
}

impl ScriptedRunner {
    /// Runner that always succeeds
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Runner that replays `codes`, then succeeds
    pub fn with_exit_codes(codes: impl IntoIterator<Item = i32>) -> Self {
        Self {
            exit_codes: Mutex::new(codes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Runner that always fails with `code`
    pub fn failing(code: i32, times: usize) -> Self {
        Self::with_exit_codes(std::iter::repeat_n(code, times))
    }

    /// Add a simulated run time
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of runs recorded for `job_id`
    pub fn runs_of(&self, job_id: &str) -> usize {
        self.runs.lock().unwrap().get(job_id).copied().unwrap_or(0)
    }

    /// Snapshot of all recorded runs
    pub fn all_runs(&self) -> HashMap<String, usize> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, job: &Job, _timeout: Duration) -> Result<ExecutionReport, JobExecutionError> {
        *self.runs.lock().unwrap().entry(job.id.clone()).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
        if code == 0 {
            Ok(ExecutionReport {
                exit_code: 0,
                output: String::new(),
                elapsed: self.delay,
            })
        } else {
            Err(JobExecutionError::NonZeroExit {
                code,
                output: format!("scripted failure {code}"),
            })
        }
    }
}
