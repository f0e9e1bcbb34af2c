//! Dead-letter queue CLI commands.

use std::path::Path;

use clap::{Args, Subcommand};

use crate::output::{self, DeadLetterRow, OutputFormat};
use queuectl_core::error::AppError;

/// Arguments for dlq commands
#[derive(Debug, Args)]
pub struct DlqArgs {
    /// DLQ subcommand
    #[command(subcommand)]
    pub command: DlqCommand,
}

/// DLQ subcommands
#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// List dead jobs, most recent first
    List {
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show one dead job
    Show {
        /// Job ID
        id: String,
    },
    /// Put a dead job back on the queue with its retry count reset
    Retry {
        /// Job ID
        id: String,
    },
    /// Permanently delete a dead job
    Remove {
        /// Job ID
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Execute dlq commands
pub async fn execute(
    args: &DlqArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = super::connect(config_path).await?;
    let dlq = &services.dlq;

    match &args.command {
        DlqCommand::List { limit } => {
            let entries = dlq.list(*limit).await?;
            match format {
                OutputFormat::Json => output::print_json(&entries),
                OutputFormat::Table => {
                    let rows: Vec<DeadLetterRow> = entries.iter().map(DeadLetterRow::from).collect();
                    output::print_list(&rows, format);
                }
            }
        }
        DlqCommand::Show { id } => {
            let entry = dlq.get(id).await?;
            output::print_dead_letter(&entry, format);
        }
        DlqCommand::Retry { id } => {
            let job = dlq.retry(id).await?;
            match format {
                OutputFormat::Json => output::print_json(&job),
                OutputFormat::Table => {
                    output::print_success(&format!("Job '{}' moved back to the queue", job.id))
                }
            }
        }
        DlqCommand::Remove { id, yes } => {
            let entry = dlq.get(id).await?;
            if !yes {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Permanently delete dead job '{id}' ({})?",
                        entry.job.command
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            dlq.remove(id).await?;
            output::print_success(&format!("Dead job '{id}' removed"));
        }
    }

    Ok(())
}
