//! CLI command definitions and dispatch.

pub mod config;
pub mod dlq;
pub mod enqueue;
pub mod jobs;
pub mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use queuectl_core::config::AppConfig;
use queuectl_core::error::AppError;
use queuectl_database::DatabasePool;
use queuectl_database::repositories::{DeadLetterRepository, JobRepository};
use queuectl_worker::{DlqManager, JobQueue};

/// QueueCTL: a durable job queue for shell commands
#[derive(Debug, Parser)]
#[command(name = "queuectl", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: <data dir>/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a job to the queue
    Enqueue(enqueue::EnqueueArgs),
    /// Run workers
    Worker(worker::WorkerArgs),
    /// Show job counts per state
    Status,
    /// List jobs
    List(jobs::ListArgs),
    /// Show one job
    Show {
        /// Job ID
        id: String,
    },
    /// Delete a job from the queue
    Delete {
        /// Job ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Dead-letter queue management
    Dlq(dlq::DlqArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config_path = self.config.as_deref();
        match &self.command {
            Commands::Enqueue(args) => enqueue::execute(args, config_path, self.format).await,
            Commands::Worker(args) => worker::execute(args, config_path).await,
            Commands::Status => jobs::status(config_path, self.format).await,
            Commands::List(args) => jobs::list(args, config_path, self.format).await,
            Commands::Show { id } => jobs::show(id, config_path, self.format).await,
            Commands::Delete { id, yes } => jobs::delete(id, *yes, config_path).await,
            Commands::Dlq(args) => dlq::execute(args, config_path, self.format).await,
            Commands::Config(args) => config::execute(args, config_path, self.format).await,
        }
    }

    /// Log level used when `RUST_LOG` is unset
    pub fn default_log_level(&self) -> &'static str {
        match self.command {
            Commands::Worker(_) => "info",
            _ => "warn",
        }
    }
}

/// Handles shared by the commands that touch the job store
pub struct Services {
    /// Loaded configuration
    pub config: AppConfig,
    /// Open database pool
    pub db: DatabasePool,
    /// Submission and inspection facade
    pub queue: JobQueue,
    /// Dead-letter queue manager
    pub dlq: DlqManager,
}

/// Helper: load configuration from file and environment
pub fn load_config(config_path: Option<&std::path::Path>) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: open the job store and build the queue services
pub async fn connect(config_path: Option<&std::path::Path>) -> Result<Services, AppError> {
    let config = load_config(config_path)?;
    let db = DatabasePool::connect(&config.database).await?;
    let jobs = Arc::new(JobRepository::new(db.pool().clone(), &config.queue));
    let dead_letters = Arc::new(DeadLetterRepository::new(db.pool().clone()));
    let queue = JobQueue::new(jobs, Arc::clone(&dead_letters), config.queue.clone());
    let dlq = DlqManager::new(dead_letters);
    Ok(Services {
        config,
        db,
        queue,
        dlq,
    })
}
