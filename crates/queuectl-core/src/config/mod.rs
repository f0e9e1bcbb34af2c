//! Application configuration schemas.
//!
//! All configuration structs are deserialized from an optional TOML file
//! via the `config` crate, overlaid with `QUEUECTL__SECTION__KEY`
//! environment variables. Each sub-module represents a logical
//! configuration section.

pub mod database;
pub mod file;
pub mod logging;
pub mod queue;
pub mod worker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::queue::QueueConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "QUEUECTL_HOME";

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Retry and backoff defaults for new jobs.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Worker loop settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and the environment.
    ///
    /// The file is optional; when `path` is `None` the default location
    /// `<data dir>/config.toml` is used.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let config = config::Config::builder()
            .add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("QUEUECTL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.validate()?;
        Ok(app)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        let queue = &self.queue;
        if !queue.backoff_base.is_finite() || queue.backoff_base < 0.0 {
            return Err(AppError::configuration(
                "queue.backoff_base must be a finite, non-negative number",
            ));
        }
        if !queue.backoff_max_seconds.is_finite() || queue.backoff_max_seconds < 0.0 {
            return Err(AppError::configuration(
                "queue.backoff_max_seconds must be a finite, non-negative number",
            ));
        }

        let worker = &self.worker;
        if worker.count == 0 {
            return Err(AppError::configuration("worker.count must be at least 1"));
        }
        if worker.lease_duration_seconds == 0 {
            return Err(AppError::configuration(
                "worker.lease_duration_seconds must be positive",
            ));
        }
        if worker.execution_timeout_seconds == 0
            || worker.execution_timeout_seconds >= worker.lease_duration_seconds
        {
            return Err(AppError::configuration(format!(
                "worker.execution_timeout_seconds ({}) must be positive and shorter than \
                 worker.lease_duration_seconds ({})",
                worker.execution_timeout_seconds, worker.lease_duration_seconds
            )));
        }
        if worker.claim_batch_size == 0 {
            return Err(AppError::configuration(
                "worker.claim_batch_size must be at least 1",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::configuration(
                "database.max_connections must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Directory holding the database and configuration file.
///
/// `QUEUECTL_HOME` wins; otherwise `$HOME/.queuectl`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".queuectl")
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}
