//! QueueCTL worker daemon.
//!
//! Loads configuration, opens the job store and runs `worker.count` workers
//! until Ctrl+C or SIGTERM.

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use queuectl_core::config::{AppConfig, LogFormat};
use queuectl_core::error::AppError;
use queuectl_database::DatabasePool;
use queuectl_worker::{WorkerPool, shutdown_signal};

#[tokio::main]
async fn main() {
    let config_path = std::env::var_os("QUEUECTL_CONFIG").map(std::path::PathBuf::from);
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Worker daemon failed");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Open the store, run the pool, and wait for a shutdown signal
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.worker.count,
        "Starting QueueCTL worker daemon"
    );

    let db = DatabasePool::connect(&config.database).await?;
    let pool = WorkerPool::from_config(db.pool().clone(), &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = pool.run(shutdown_rx);
    tokio::pin!(workers);

    tokio::select! {
        _ = &mut workers => {
            tracing::warn!("All workers exited before a shutdown signal");
        }
        _ = shutdown_signal() => {
            tracing::info!(
                grace_seconds = config.worker.shutdown_grace_seconds,
                "Shutdown signal received, draining workers"
            );
            let _ = shutdown_tx.send(true);
            workers.await;
        }
    }

    db.close().await;
    tracing::info!("QueueCTL worker daemon stopped");
    Ok(())
}
