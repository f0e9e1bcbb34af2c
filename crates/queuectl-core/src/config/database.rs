//! Database configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// SQLite connection pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Empty means `<data dir>/queuectl.db`.
    #[serde(default)]
    pub path: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long SQLite waits on a locked database before giving up, in
    /// milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
    /// Pool acquire timeout in seconds.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Configuration pointing at an explicit database file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// Resolve the database file, falling back to the data directory.
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.trim().is_empty() {
            super::data_dir().join("queuectl.db")
        } else {
            PathBuf::from(&self.path)
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout() -> u64 {
    10_000
}

fn default_acquire_timeout() -> u64 {
    10
}
