//! Job submission command.

use clap::Args;

use crate::output::{self, OutputFormat};
use queuectl_core::error::AppError;
use queuectl_entity::job::NewJob;

/// Arguments for `enqueue`
#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Job as a JSON object (`{"id": "...", "command": "...", "max_retries": 3}`)
    /// or plain command text. Prompts interactively when omitted.
    pub job: Option<String>,

    /// Job ID (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Retry budget (defaults to `queue.max_retries`)
    #[arg(short, long)]
    pub max_retries: Option<u32>,
}

/// Execute `enqueue`
pub async fn execute(
    args: &EnqueueArgs,
    config_path: Option<&std::path::Path>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = super::connect(config_path).await?;

    let mut job = match &args.job {
        Some(raw) => parse_job(raw)?,
        None => prompt_job(services.config.queue.max_retries)?,
    };
    if let Some(id) = &args.id {
        job.id = Some(id.clone());
    }
    if let Some(max_retries) = args.max_retries {
        job.max_retries = Some(max_retries);
    }

    let job = services.queue.submit(job).await?;
    match format {
        OutputFormat::Json => output::print_json(&job),
        OutputFormat::Table => output::print_success(&format!(
            "Job '{}' enqueued (max retries: {})",
            job.id, job.max_retries
        )),
    }
    Ok(())
}

/// Interpret the positional JOB argument.
///
/// Input starting with `{` must be a JSON job object; anything else is taken
/// as the command text.
pub fn parse_job(raw: &str) -> Result<NewJob, AppError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str::<NewJob>(trimmed)
            .map_err(|e| AppError::validation(format!("Invalid job JSON: {e}")))
    } else if trimmed.is_empty() {
        Err(AppError::validation("Job command must not be empty"))
    } else {
        Ok(NewJob::command(trimmed))
    }
}

fn prompt_job(default_max_retries: u32) -> Result<NewJob, AppError> {
    let command: String = dialoguer::Input::new()
        .with_prompt("Command")
        .interact_text()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

    let id: String = dialoguer::Input::new()
        .with_prompt("Job ID (optional, press Enter to generate)")
        .allow_empty(true)
        .interact_text()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

    let max_retries: u32 = dialoguer::Input::new()
        .with_prompt("Max retries")
        .default(default_max_retries)
        .interact_text()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

    let mut job = NewJob::command(command).with_max_retries(max_retries);
    if !id.trim().is_empty() {
        job = job.with_id(id.trim());
    }
    Ok(job)
}
