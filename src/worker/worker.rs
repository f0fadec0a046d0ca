use crate::config::Config;
use crate::error::QueueError;
use crate::jobs::model::Job;
use crate::jobs::store::JobStore;
use crate::worker::executor::{execute_command, CommandOutcome};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A single logical execution unit: claim a job, run it, record the outcome,
/// repeat. One `Worker` runs per worker process; workers coordinate only
/// through the store.
pub struct Worker {
    worker_id: String,
    store: JobStore,
    poll_interval: Duration,
    execution_timeout: Duration,
    stuck_timeout: Duration,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        worker_id: String,
        store: JobStore,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            worker_id,
            store,
            poll_interval: config.poll_interval,
            execution_timeout: config.execution_timeout,
            stuck_timeout: config.stuck_timeout,
            shutdown,
        }
    }

    /// Request a cooperative stop. Observed between jobs: an in-flight
    /// command still runs to its outcome (bounded by the execution timeout)
    /// and that outcome is recorded before the loop exits.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// The worker loop. Store errors are logged and followed by a sleep;
    /// a transient storage hiccup must not kill the worker process.
    pub async fn run(&self) {
        // Jobs orphaned by a previous crash become claimable again before we
        // start pulling new work.
        match self.store.recover_stuck_jobs(to_chrono(self.stuck_timeout)).await {
            Ok(0) => {}
            Ok(recovered) => {
                info!(worker_id = %self.worker_id, recovered, "recovered stuck jobs");
            }
            Err(e) => {
                warn!(worker_id = %self.worker_id, error = %e, "stuck job recovery failed");
            }
        }

        info!(worker_id = %self.worker_id, "worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.store.claim(&self.worker_id).await {
                Ok(Some(job)) => {
                    info!(worker_id = %self.worker_id, job_id = %job.id, command = %job.command, "claimed job");
                    self.run_job(&job).await;
                }
                Ok(None) => {
                    // Queue empty for now. Sleeping here is the only
                    // back-pressure against the store.
                    self.idle().await;
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "failed to claim job");
                    self.idle().await;
                }
            }
        }

        info!(worker_id = %self.worker_id, "worker stopped");
    }

    async fn run_job(&self, job: &Job) {
        let outcome = execute_command(&job.command, self.execution_timeout).await;

        if let Err(e) = self.apply_outcome(job, outcome).await {
            // The job stays claimed; the stuck sweep will free it later.
            error!(worker_id = %self.worker_id, job_id = %job.id, error = %e, "failed to record job outcome");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Apply an execution outcome to the store: complete, reschedule with
    /// backoff, or escalate to the DLQ once retries are exhausted.
    pub async fn apply_outcome(
        &self,
        job: &Job,
        outcome: CommandOutcome,
    ) -> Result<(), QueueError> {
        match outcome {
            CommandOutcome::Completed { stdout, stderr } => {
                self.store.mark_completed(&job.id, &stdout, &stderr).await?;
                info!(worker_id = %self.worker_id, job_id = %job.id, "job completed");
            }
            CommandOutcome::Failed { exit_code, message } => {
                let attempts = job.attempts + 1;

                if attempts <= job.max_retries {
                    let delay = self
                        .store
                        .schedule_retry(&job.id, attempts, &message)
                        .await?;
                    warn!(
                        worker_id = %self.worker_id,
                        job_id = %job.id,
                        attempts,
                        max_retries = job.max_retries,
                        delay_seconds = delay,
                        error = %message,
                        "job failed, retry scheduled"
                    );
                } else {
                    self.store
                        .mark_dead(&job.id, attempts, exit_code, &message)
                        .await?;
                    error!(
                        worker_id = %self.worker_id,
                        job_id = %job.id,
                        attempts,
                        error = %message,
                        "job failed permanently, escalated to dead letter queue"
                    );
                }
            }
        }
        Ok(())
    }

    async fn idle(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(300))
}
