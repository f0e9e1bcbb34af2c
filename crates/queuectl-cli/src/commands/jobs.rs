//! Job inspection and administration commands.

use std::path::Path;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, JobRow, OutputFormat};
use queuectl_core::error::AppError;
use queuectl_entity::job::JobState;

/// Arguments for `list`
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only show jobs in this state (pending, processing, done, dead)
    #[arg(short, long)]
    pub state: Option<JobState>,

    /// Maximum number of jobs to show
    #[arg(short, long)]
    pub limit: Option<u32>,
}

/// State count row for table output
#[derive(Debug, Serialize, Tabled)]
struct CountRow {
    /// State
    state: String,
    /// Number of jobs
    count: i64,
}

/// Execute `status`
pub async fn status(config_path: Option<&Path>, format: OutputFormat) -> Result<(), AppError> {
    let services = super::connect(config_path).await?;
    let counts = services.queue.stats().await?;

    match format {
        OutputFormat::Json => output::print_json(&counts),
        OutputFormat::Table => {
            let rows: Vec<CountRow> = JobState::ALL
                .iter()
                .map(|state| CountRow {
                    state: state.to_string(),
                    count: counts.get(*state),
                })
                .collect();
            println!("Queue Status:");
            output::print_list(&rows, format);
            output::print_kv("Total", &counts.total().to_string());
            output::print_kv(
                "Database",
                &services.config.database.resolved_path().display().to_string(),
            );
        }
    }
    Ok(())
}

/// Execute `list`
pub async fn list(
    args: &ListArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = super::connect(config_path).await?;
    let jobs = services.queue.list(args.state, args.limit).await?;

    match format {
        OutputFormat::Json => output::print_json(&jobs),
        OutputFormat::Table => {
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
        }
    }
    Ok(())
}

/// Execute `show`
pub async fn show(id: &str, config_path: Option<&Path>, format: OutputFormat) -> Result<(), AppError> {
    let services = super::connect(config_path).await?;
    let job = services.queue.get(id).await?;
    output::print_job(&job, format);
    Ok(())
}

/// Execute `delete`
pub async fn delete(id: &str, yes: bool, config_path: Option<&Path>) -> Result<(), AppError> {
    let services = super::connect(config_path).await?;
    let job = services.queue.get(id).await?;

    if job.state == JobState::Dead {
        return Err(AppError::validation(format!(
            "Job '{id}' is in the dead-letter queue; use `queuectl dlq remove {id}`"
        )));
    }
    if job.state == JobState::Processing {
        output::print_warning(&format!(
            "Job '{id}' is being processed; the running worker will not be stopped"
        ));
    }

    if !yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!("Delete job '{id}' ({})?", job.command))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    services.queue.delete(id).await?;
    output::print_success(&format!("Job '{id}' deleted"));
    Ok(())
}
