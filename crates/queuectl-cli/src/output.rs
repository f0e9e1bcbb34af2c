//! Table and JSON output formatting for CLI commands.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::{Table, Tabled};

use queuectl_entity::dead_letter::DeadLetter;
use queuectl_entity::job::Job;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Job display row for table output
#[derive(Debug, Serialize, Tabled)]
pub struct JobRow {
    /// Job ID
    id: String,
    /// State
    state: String,
    /// Retries used / allowed
    retries: String,
    /// Command
    command: String,
    /// Next eligible run
    next_run_at: String,
    /// Last error
    last_error: String,
}

impl From<&Job> for JobRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            state: job.state.to_string(),
            retries: format!("{}/{}", job.retries, job.max_retries),
            command: truncate(&job.command, 40),
            next_run_at: timestamp(job.next_run_at),
            last_error: job
                .last_error
                .as_deref()
                .map(|e| truncate(e, 40))
                .unwrap_or_default(),
        }
    }
}

/// DLQ entry display row for table output
#[derive(Debug, Serialize, Tabled)]
pub struct DeadLetterRow {
    /// Job ID
    id: String,
    /// Command
    command: String,
    /// Retries used
    retries: u32,
    /// When it died
    dead_at: String,
    /// Reason
    reason: String,
}

impl From<&DeadLetter> for DeadLetterRow {
    fn from(entry: &DeadLetter) -> Self {
        Self {
            id: entry.job.id.clone(),
            command: truncate(&entry.job.command, 40),
            retries: entry.job.retries,
            dead_at: timestamp(entry.dead_at),
            reason: truncate(&entry.reason, 60),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputFormat::Json => print_json(items),
    }
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string());
    println!("{json}");
}

/// Print a job's full details
pub fn print_job(job: &Job, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(job),
        OutputFormat::Table => {
            println!("Job {}", job.id);
            print_job_fields(job);
        }
    }
}

/// Print a DLQ entry's full details
pub fn print_dead_letter(entry: &DeadLetter, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(entry),
        OutputFormat::Table => {
            println!("Dead-letter entry {}", entry.job.id);
            print_job_fields(&entry.job);
            print_kv("Dead at", &timestamp(entry.dead_at));
            print_kv("Reason", &entry.reason);
        }
    }
}

fn print_job_fields(job: &Job) {
    print_kv("Command", &job.command);
    print_kv("State", job.state.as_str());
    print_kv("Retries", &format!("{}/{}", job.retries, job.max_retries));
    print_kv("Next run at", &timestamp(job.next_run_at));
    if let Some(until) = job.locked_until {
        print_kv("Locked until", &timestamp(until));
    }
    print_kv("Created at", &timestamp(job.created_at));
    print_kv("Updated at", &timestamp(job.updated_at));
    if let Some(error) = &job.last_error {
        print_kv("Last error", error);
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.lines().next().unwrap_or_default();
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
