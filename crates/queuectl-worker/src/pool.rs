//! Worker pool of runners sharing one job store.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinSet;

use queuectl_core::backoff::BackoffPolicy;
use queuectl_core::config::AppConfig;
use queuectl_database::repositories::JobRepository;

use crate::executor::{CommandRunner, JobExecutor, ShellRunner};
use crate::lease::LeaseManager;
use crate::runner::WorkerRunner;

/// A set of worker runners driven by one shutdown signal.
#[derive(Debug)]
pub struct WorkerPool {
    runners: Vec<Arc<WorkerRunner>>,
}

impl WorkerPool {
    /// Build `count` workers that run commands through `runner`.
    pub fn new(
        pool: SqlitePool,
        config: &AppConfig,
        count: usize,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let jobs = Arc::new(JobRepository::new(pool, &config.queue));
        let leases = Arc::new(LeaseManager::new(
            Arc::clone(&jobs),
            BackoffPolicy::from(&config.queue),
        ));
        let executor = Arc::new(JobExecutor::new(runner, config.worker.execution_timeout()));
        let pid = std::process::id();

        let runners = (1..=count)
            .map(|index| {
                Arc::new(WorkerRunner::new(
                    Arc::clone(&jobs),
                    Arc::clone(&leases),
                    Arc::clone(&executor),
                    config.worker.clone(),
                    format!("worker-{pid}-{index}"),
                ))
            })
            .collect();

        Self { runners }
    }

    /// Build `worker.count` shell workers from configuration.
    pub fn from_config(pool: SqlitePool, config: &AppConfig) -> Self {
        Self::new(pool, config, config.worker.count, Arc::new(ShellRunner))
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.runners.len()
    }

    /// The pool's runners.
    pub fn runners(&self) -> &[Arc<WorkerRunner>] {
        &self.runners
    }

    /// Run every worker until `shutdown` flips to true, then wait for all of
    /// them to stop.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tracing::info!(workers = self.runners.len(), "Starting worker pool");

        let mut tasks = JoinSet::new();
        for runner in &self.runners {
            let runner = Arc::clone(runner);
            let shutdown = shutdown.clone();
            tasks.spawn(async move { runner.run(shutdown).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        tracing::info!("Worker pool stopped");
    }
}

/// Resolve when the process receives Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
