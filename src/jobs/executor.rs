//! Job Worker
//!
//! One worker per queue: on every tick it claims as many due jobs as the
//! queue's pool has free slots, runs them in the background, and records the
//! outcome with exponential backoff and retry-after handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use rand::{Rng, thread_rng};
use sea_orm::{DatabaseConnection, DbErr};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{FailureKind, JobFailure, JobHandler, QueuePolicy};
use crate::config::WorkerConfig;
use crate::models::job::{self, STATUS_COMPLETED, STATUS_FAILED};
use crate::repositories::JobRepository;

/// Delay before the next attempt.
///
/// `base * 2^(attempts-1)` capped at `max`, raised to the provider's
/// retry-after hint when that is longer, plus up to `jitter_factor` of spread.
pub fn backoff_delay(
    base: Duration,
    attempts: i32,
    max: Duration,
    jitter_factor: f64,
    retry_after: Option<Duration>,
) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 30);
    let mut backoff = (base.as_secs_f64() * 2_f64.powi(exponent)).min(max.as_secs_f64());

    if let Some(hint) = retry_after {
        backoff = backoff.max(hint.as_secs_f64());
    }

    let jitter = if jitter_factor > 0.0 && backoff > 0.0 {
        thread_rng().gen_range(0.0..(jitter_factor * backoff))
    } else {
        0.0
    };
    Duration::from_secs_f64(backoff + jitter)
}

/// Worker bound to a single queue
#[derive(Clone)]
pub struct Worker {
    jobs: JobRepository,
    handler: Arc<dyn JobHandler>,
    policy: QueuePolicy,
    config: WorkerConfig,
    permits: Arc<Semaphore>,
}

impl Worker {
    pub fn new(db: DatabaseConnection, handler: Arc<dyn JobHandler>, config: WorkerConfig) -> Self {
        let policy = handler.policy();
        Self {
            jobs: JobRepository::new(db),
            permits: Arc::new(Semaphore::new(policy.concurrency)),
            handler,
            policy,
            config,
        }
    }

    pub fn policy(&self) -> &QueuePolicy {
        &self.policy
    }

    /// Process due jobs until `shutdown` fires.
    ///
    /// Each tick claims only as many jobs as there are free permits, so a slow
    /// job never holds back the rest of the pool. On shutdown no new jobs are
    /// claimed and in-flight ones are awaited.
    pub async fn run(self, shutdown: CancellationToken) {
        let queue = self.policy.queue;
        info!(queue, concurrency = self.policy.concurrency, "Starting job worker");

        let stale_before = Utc::now()
            - chrono::Duration::seconds(self.config.max_run_seconds as i64);
        match self.jobs.recover_stale(queue, stale_before).await {
            Ok(0) => {}
            Ok(recovered) => warn!(queue, recovered, "Requeued stale running jobs"),
            Err(e) => error!(queue, error = %e, "Failed to recover stale jobs"),
        }

        let tick = Duration::from_millis(self.config.tick_ms);
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(queue, "Job worker shutdown requested");
                    break;
                }
                _ = sleep(tick) => {
                    while let Some(result) = in_flight.try_join_next() {
                        self.log_join(result);
                    }
                    match self.spawn_due(Utc::now(), &mut in_flight).await {
                        Ok(0) => {}
                        Ok(count) => debug!(queue, count, "Started jobs"),
                        Err(e) => error!(queue, error = %e, "Failed to claim jobs"),
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(queue, in_flight = in_flight.len(), "Draining in-flight jobs");
        }
        while let Some(result) = in_flight.join_next().await {
            self.log_join(result);
        }
        info!(queue, "Job worker stopped");
    }

    /// Claim jobs due at `now` and run them to completion; returns how many ran
    pub async fn process_due_at(&self, now: DateTime<Utc>) -> Result<usize, DbErr> {
        let mut in_flight = JoinSet::new();
        let count = self.spawn_due(now, &mut in_flight).await?;
        while let Some(result) = in_flight.join_next().await {
            self.log_join(result);
        }
        Ok(count)
    }

    /// Claim up to the free permits' worth of due jobs and start them on `tasks`
    async fn spawn_due(
        &self,
        now: DateTime<Utc>,
        tasks: &mut JoinSet<()>,
    ) -> Result<usize, DbErr> {
        let mut permits = Vec::new();
        while let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            permits.push(permit);
        }
        if permits.is_empty() {
            return Ok(0);
        }

        let claimed = self
            .jobs
            .claim(self.policy.queue, permits.len() as u64, now)
            .await?;
        let count = claimed.len();

        for (job, permit) in claimed.into_iter().zip(permits) {
            let worker = self.clone();
            let span = info_span!("job", queue = worker.policy.queue, job_id = %job.id, attempt = job.attempts);
            tasks.spawn(
                async move {
                    let _permit = permit;
                    worker.run_job(job).await;
                }
                .instrument(span),
            );
        }
        Ok(count)
    }

    fn log_join(&self, result: Result<(), JoinError>) {
        if let Err(e) = result {
            error!(queue = self.policy.queue, error = ?e, "Job task panicked or was cancelled");
        }
    }

    async fn run_job(&self, job: job::Model) {
        let queue = self.policy.queue;
        let started = std::time::Instant::now();
        let max_run = Duration::from_secs(self.config.max_run_seconds);

        let outcome = match tokio::time::timeout(max_run, self.handler.handle(&job)).await {
            Ok(result) => result,
            Err(_) => Err(JobFailure::transient(format!(
                "job exceeded {}s run time",
                max_run.as_secs()
            ))),
        };
        histogram!("job_duration_seconds", "queue" => queue)
            .record(started.elapsed().as_secs_f64());

        let recorded = match outcome {
            Ok(()) => self.record_success(&job).await,
            Err(failure) => self.record_failure(&job, failure).await,
        };
        if let Err(e) = recorded {
            error!(queue, job_id = %job.id, error = %e, "Failed to record job outcome");
        }
    }

    async fn record_success(&self, job: &job::Model) -> Result<(), DbErr> {
        self.jobs.complete(job.id).await?;
        counter!("jobs_completed_total", "queue" => self.policy.queue).increment(1);
        info!(job_id = %job.id, attempts = job.attempts, "Job completed");
        self.jobs
            .prune(self.policy.queue, STATUS_COMPLETED, self.policy.keep_completed)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, job: &job::Model, failure: JobFailure) -> Result<(), DbErr> {
        let queue = self.policy.queue;
        let now = Utc::now();
        let exhausted = job.attempts >= job.max_attempts;

        if let FailureKind::RateLimited { .. } = failure.kind {
            counter!("provider_rate_limited_total", "queue" => queue).increment(1);
        }

        if failure.is_retryable() && !exhausted {
            let delay = backoff_delay(
                self.policy.base_backoff,
                job.attempts,
                Duration::from_secs(self.config.max_backoff_seconds),
                self.config.jitter_factor,
                failure.retry_after(),
            );
            let run_at = now
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            let details = serde_json::json!({
                "failure": failure,
                "attempts": job.attempts,
                "backoff_seconds": delay.as_secs_f64(),
                "timestamp": now.to_rfc3339(),
            });
            self.jobs.retry(job.id, run_at, details).await?;
            counter!("jobs_retried_total", "queue" => queue).increment(1);
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                backoff_seconds = delay.as_secs_f64(),
                error = %failure,
                "Job failed, retrying"
            );
            return Ok(());
        }

        let details = serde_json::json!({
            "failure": failure,
            "attempts": job.attempts,
            "timestamp": now.to_rfc3339(),
        });
        self.jobs.fail(job.id, details).await?;
        counter!("jobs_failed_total", "queue" => queue).increment(1);
        error!(
            job_id = %job.id,
            attempts = job.attempts,
            error = %failure,
            "Job failed permanently"
        );
        self.handler.on_exhausted(job, &failure).await;
        self.jobs
            .prune(queue, STATUS_FAILED, self.policy.keep_failed)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(5);
    const MAX: Duration = Duration::from_secs(900);

    fn within(actual: Duration, low: f64, high: f64) -> bool {
        let secs = actual.as_secs_f64();
        secs >= low && secs <= high
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert!(within(backoff_delay(BASE, 1, MAX, 0.1, None), 5.0, 5.5));
        assert!(within(backoff_delay(BASE, 2, MAX, 0.1, None), 10.0, 11.0));
        assert!(within(backoff_delay(BASE, 3, MAX, 0.1, None), 20.0, 22.0));
    }

    #[test]
    fn backoff_is_capped() {
        let delay = backoff_delay(BASE, 12, MAX, 0.1, None);
        assert!(within(delay, 900.0, 990.0));
    }

    #[test]
    fn retry_after_wins_when_longer() {
        let delay = backoff_delay(BASE, 1, MAX, 0.1, Some(Duration::from_secs(300)));
        assert!(within(delay, 300.0, 330.0));

        let delay = backoff_delay(BASE, 4, MAX, 0.1, Some(Duration::from_secs(2)));
        assert!(within(delay, 40.0, 44.0));
    }

    #[test]
    fn zero_jitter_is_exact() {
        let delay = backoff_delay(Duration::from_secs(2), 2, MAX, 0.0, None);
        assert_eq!(delay, Duration::from_secs(4));
    }
}
