//! Configuration management CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use queuectl_core::config::{default_config_path, file};
use queuectl_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print one value (`queue.max_retries`, `max-retries`, ...)
    Get {
        /// Configuration key
        key: String,
    },
    /// Set one value in the configuration file
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },
}

/// Config display row for table output
#[derive(Debug, Serialize, Tabled)]
struct ConfigRow {
    /// Dotted key
    key: String,
    /// Effective value
    value: String,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            match format {
                OutputFormat::Json => output::print_json(&config),
                OutputFormat::Table => {
                    let rows: Vec<ConfigRow> = file::entries(&config)?
                        .into_iter()
                        .map(|(key, value)| ConfigRow { key, value })
                        .collect();
                    output::print_list(&rows, format);
                }
            }
        }
        ConfigCommand::Get { key } => {
            let config = super::load_config(config_path)?;
            println!("{}", file::get_value(&config, key)?);
        }
        ConfigCommand::Set { key, value } => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(default_config_path);
            let canonical = file::set_value(&path, key, value)?;
            output::print_success(&format!(
                "Set {canonical} = {value} in '{}'",
                path.display()
            ));
            output::print_warning("Existing jobs keep the settings they were enqueued with");
        }
    }

    Ok(())
}
