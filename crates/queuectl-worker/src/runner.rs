//! Worker runner: the loop that polls for jobs and executes them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;

use queuectl_core::config::WorkerConfig;
use queuectl_core::error::{AppError, ErrorKind};
use queuectl_core::result::AppResult;
use queuectl_database::repositories::JobRepository;
use queuectl_entity::dead_letter::DeadLetter;
use queuectl_entity::job::{FailureOutcome, Job, Lease};

use crate::executor::JobExecutor;
use crate::lease::{Acquire, LeaseManager};

/// What a worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Between cycles, possibly sleeping.
    Idle,
    /// Looking for a claimable job.
    Polling,
    /// Running a leased job's command.
    Executing,
    /// Recording the outcome of a run.
    Reporting,
    /// Shut down.
    Stopped,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Executing => "executing",
            Self::Reporting => "reporting",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Result of one poll/execute/report cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing could be claimed.
    Idle,
    /// The job ran successfully and is done.
    Completed(Job),
    /// The job failed and was rescheduled.
    Retrying(Job),
    /// The job failed for the last time and is in the DLQ.
    Dead(DeadLetter),
    /// The lease lapsed before the outcome was recorded; the result was
    /// discarded.
    LeaseLost(String),
}

/// Main worker runner that polls the job store and executes jobs
#[derive(Debug)]
pub struct WorkerRunner {
    /// Job store for candidate listing
    jobs: Arc<JobRepository>,
    /// Lease manager for claims and outcome reports
    leases: Arc<LeaseManager>,
    /// Command executor
    executor: Arc<JobExecutor>,
    /// Worker configuration
    config: WorkerConfig,
    /// Worker identifier
    worker_id: String,
    /// Current phase, observable through [`WorkerRunner::phase_watch`]
    phase: watch::Sender<WorkerPhase>,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        jobs: Arc<JobRepository>,
        leases: Arc<LeaseManager>,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        let (phase, _) = watch::channel(WorkerPhase::Idle);
        Self {
            jobs,
            leases,
            executor,
            config,
            worker_id,
            phase,
        }
    }

    /// The worker's identifier
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Current phase
    pub fn phase(&self) -> WorkerPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes
    pub fn phase_watch(&self) -> watch::Receiver<WorkerPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.phase.send_replace(phase);
    }

    /// Run the worker until the shutdown signal is received.
    ///
    /// Once the signal is seen no new job is claimed; a claim that completes
    /// after the signal is handed back unrun. A job already executing gets
    /// `shutdown_grace` to finish and report; after that its command is killed
    /// and the lease is left to expire so another worker can pick it up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            worker_id = %self.worker_id,
            poll_interval_ms = self.config.poll_interval_ms,
            lease_seconds = self.config.lease_duration_seconds,
            "Worker started"
        );

        let poll_interval = self.config.poll_interval();
        let grace = self.config.shutdown_grace();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let lease = match self.claim_next(Some(&shutdown)).await {
                Ok(Some(lease)) => lease,
                Ok(None) => {
                    self.set_phase(WorkerPhase::Idle);
                    tracing::trace!(worker_id = %self.worker_id, "No claimable jobs");
                    if pause(&mut shutdown, poll_interval).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    self.set_phase(WorkerPhase::Idle);
                    self.log_cycle_error(&e);
                    if pause(&mut shutdown, poll_interval).await {
                        break;
                    }
                    continue;
                }
            };

            let cycle = self.execute_and_report(lease);
            tokio::pin!(cycle);

            let mut stopping = false;
            let outcome = tokio::select! {
                outcome = &mut cycle => outcome,
                _ = shutdown.changed() => {
                    stopping = true;
                    tracing::info!(
                        worker_id = %self.worker_id,
                        phase = %self.phase(),
                        grace_seconds = grace.as_secs(),
                        "Shutdown requested, finishing in-flight job"
                    );
                    match time::timeout(grace, &mut cycle).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::warn!(
                                worker_id = %self.worker_id,
                                "Grace period elapsed, abandoning in-flight job; its lease will expire"
                            );
                            break;
                        }
                    }
                }
            };
            self.set_phase(WorkerPhase::Idle);

            if let Err(e) = &outcome {
                self.log_cycle_error(e);
            }
            if stopping {
                break;
            }
            if outcome.is_err() && pause(&mut shutdown, poll_interval).await {
                break;
            }
        }

        self.set_phase(WorkerPhase::Stopped);
        tracing::info!(worker_id = %self.worker_id, "Worker shut down complete");
    }

    /// Run a single poll → execute → report cycle.
    pub async fn run_once(&self) -> AppResult<CycleOutcome> {
        let result = match self.claim_next(None).await {
            Ok(Some(lease)) => self.execute_and_report(lease).await,
            Ok(None) => {
                tracing::trace!(worker_id = %self.worker_id, "No claimable jobs");
                Ok(CycleOutcome::Idle)
            }
            Err(e) => Err(e),
        };
        self.set_phase(WorkerPhase::Idle);
        result
    }

    async fn execute_and_report(&self, lease: Lease) -> AppResult<CycleOutcome> {
        self.set_phase(WorkerPhase::Executing);
        let result = self.executor.execute(&lease.job).await;

        self.set_phase(WorkerPhase::Reporting);
        let job_id = lease.job_id().to_string();
        if !lease.is_valid_at(Utc::now()) {
            return Ok(self.lease_lost(job_id));
        }

        let reported = match result {
            Ok(report) => {
                tracing::info!(
                    worker_id = %self.worker_id,
                    job_id = %job_id,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Job completed successfully"
                );
                self.leases
                    .release_success(&lease)
                    .await
                    .map(CycleOutcome::Completed)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(worker_id = %self.worker_id, job_id = %job_id, error = %message, "Job failed");
                self.leases
                    .release_failure(&lease, &message)
                    .await
                    .map(|outcome| self.log_failure(outcome))
            }
        };

        match reported {
            Err(e) if e.kind == ErrorKind::LeaseExpired => Ok(self.lease_lost(job_id)),
            other => other,
        }
    }

    /// Try the oldest claimable candidates until one lease is granted.
    ///
    /// With a shutdown receiver, stops trying as soon as shutdown is flagged
    /// and hands back a lease granted after the flag went up.
    async fn claim_next(
        &self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> AppResult<Option<Lease>> {
        self.set_phase(WorkerPhase::Polling);
        let stop_requested = || shutdown.is_some_and(|rx| *rx.borrow());

        let candidates = self.jobs.claimable(self.config.claim_batch_size).await?;
        let lease_duration = self.config.lease_duration();

        for candidate in candidates {
            if stop_requested() {
                return Ok(None);
            }
            match self.leases.acquire(&candidate.id, lease_duration).await? {
                Acquire::Granted(lease) if stop_requested() => {
                    self.leases.release_unused(&lease).await?;
                    tracing::info!(
                        worker_id = %self.worker_id,
                        job_id = %lease.job.id,
                        "Shutdown requested during claim, job returned to the queue"
                    );
                    return Ok(None);
                }
                Acquire::Granted(lease) => {
                    tracing::debug!(
                        worker_id = %self.worker_id,
                        job_id = %lease.job.id,
                        "Claimed job"
                    );
                    return Ok(Some(lease));
                }
                Acquire::Busy => continue,
            }
        }
        Ok(None)
    }

    fn lease_lost(&self, job_id: String) -> CycleOutcome {
        tracing::warn!(
            worker_id = %self.worker_id,
            job_id = %job_id,
            "Lease expired before the outcome was recorded; result discarded"
        );
        CycleOutcome::LeaseLost(job_id)
    }

    fn log_cycle_error(&self, e: &AppError) {
        if e.is_transient() {
            tracing::warn!(worker_id = %self.worker_id, error = %e, "Job store unavailable, backing off");
        } else {
            tracing::error!(worker_id = %self.worker_id, error = %e, "Worker cycle failed");
        }
    }

    fn log_failure(&self, outcome: FailureOutcome) -> CycleOutcome {
        match outcome {
            FailureOutcome::Retrying(job) => {
                tracing::info!(
                    worker_id = %self.worker_id,
                    job_id = %job.id,
                    retries = job.retries,
                    max_retries = job.max_retries,
                    next_run_at = %job.next_run_at,
                    "Job scheduled for retry"
                );
                CycleOutcome::Retrying(job)
            }
            FailureOutcome::Dead(entry) => {
                tracing::error!(
                    worker_id = %self.worker_id,
                    job_id = %entry.job.id,
                    reason = %entry.reason,
                    "Job moved to dead-letter queue"
                );
                CycleOutcome::Dead(entry)
            }
        }
    }
}

/// Sleep for `interval`. Returns true if shutdown was signalled meanwhile.
async fn pause(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        _ = shutdown.changed() => true,
        _ = time::sleep(interval) => false,
    }
}
