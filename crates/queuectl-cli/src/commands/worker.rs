//! Worker CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};
use tokio::sync::watch;

use queuectl_core::error::AppError;
use queuectl_database::DatabasePool;
use queuectl_worker::{WorkerPool, shutdown_signal};

/// Arguments for worker commands
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Run workers in the foreground until Ctrl+C or SIGTERM
    Start {
        /// Number of workers (defaults to `worker.count`)
        #[arg(short, long)]
        count: Option<usize>,
        /// Poll interval in milliseconds (defaults to `worker.poll_interval_ms`)
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },
}

/// Execute worker commands
pub async fn execute(args: &WorkerArgs, config_path: Option<&Path>) -> Result<(), AppError> {
    match &args.command {
        WorkerCommand::Start {
            count,
            poll_interval_ms,
        } => {
            let mut config = super::load_config(config_path)?;
            if let Some(count) = count {
                config.worker.count = *count;
            }
            if let Some(ms) = poll_interval_ms {
                config.worker.poll_interval_ms = *ms;
            }
            config.validate()?;

            let db = DatabasePool::connect(&config.database).await?;
            let pool = WorkerPool::from_config(db.pool().clone(), &config);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            println!(
                "Started {} worker(s). Press Ctrl+C to stop.",
                pool.size()
            );

            let run = pool.run(shutdown_rx);
            tokio::pin!(run);

            tokio::select! {
                _ = &mut run => {}
                _ = shutdown_signal() => {
                    tracing::info!("Shutdown signal received, stopping workers");
                    let _ = shutdown_tx.send(true);
                    run.await;
                }
            }

            db.close().await;
            println!("All workers stopped.");
        }
    }

    Ok(())
}
