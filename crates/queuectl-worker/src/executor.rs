//! Runs job commands under a timeout.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use queuectl_entity::job::Job;

/// Characters of command output kept for error messages.
const OUTPUT_TAIL_CHARS: usize = 2000;

/// Trait for the component that actually runs a job's command
#[async_trait]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// Run the job's command, giving up after `timeout`
    async fn run(&self, job: &Job, timeout: Duration) -> Result<ExecutionReport, JobExecutionError>;
}

/// Outcome of a successful command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Process exit code (always 0 for a success).
    pub exit_code: i32,
    /// Tail of the combined stdout/stderr.
    pub output: String,
    /// Wall-clock run time.
    pub elapsed: Duration,
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The command exited with a non-zero code
    #[error("exit code {code}{}", format_output(.output))]
    NonZeroExit {
        /// Exit code reported by the shell
        code: i32,
        /// Tail of the command output
        output: String,
    },

    /// The command was terminated by a signal
    #[error("terminated by signal{}", format_output(.output))]
    Terminated {
        /// Tail of the command output
        output: String,
    },

    /// The command ran past the execution timeout and was killed
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    /// The shell could not be started
    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),
}

fn format_output(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(": {output}")
    }
}

/// Runs commands with `sh -c`, killing the child on timeout.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, job: &Job, timeout: Duration) -> Result<ExecutionReport, JobExecutionError> {
        let started = Instant::now();
        let child = Command::new("sh")
            .arg("-c")
            .arg(&job.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(JobExecutionError::TimedOut(timeout)),
        };

        let tail = output_tail(&output.stdout, &output.stderr);
        match output.status.code() {
            Some(0) => Ok(ExecutionReport {
                exit_code: 0,
                output: tail,
                elapsed: started.elapsed(),
            }),
            Some(code) => Err(JobExecutionError::NonZeroExit { code, output: tail }),
            None => Err(JobExecutionError::Terminated { output: tail }),
        }
    }
}

/// Prefer stderr when it has content, otherwise stdout; keep the last
/// [`OUTPUT_TAIL_CHARS`] characters.
fn output_tail(stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(stdout)
    } else {
        stderr
    };
    let text = text.trim();
    let count = text.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        text.to_string()
    } else {
        text.chars().skip(count - OUTPUT_TAIL_CHARS).collect()
    }
}

/// Executes leased jobs through a [`CommandRunner`] with a fixed timeout
#[derive(Debug, Clone)]
pub struct JobExecutor {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl JobExecutor {
    /// Create an executor around `runner`
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Executor using the real shell
    pub fn shell(timeout: Duration) -> Self {
        Self::new(Arc::new(ShellRunner), timeout)
    }

    /// Execute a job's command
    pub async fn execute(&self, job: &Job) -> Result<ExecutionReport, JobExecutionError> {
        tracing::info!(
            job_id = %job.id,
            attempt = job.retries + 1,
            max_attempts = job.max_retries + 1,
            command = %job.command,
            "Executing job"
        );
        self.runner.run(job, self.timeout).await
    }
}
