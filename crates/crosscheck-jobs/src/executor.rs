//! Job execution orchestration.
//!
//! Drives one reconciliation run from trigger to terminal state: connector
//! resolution, date-range resolution, adapter fetches, the matcher, state
//! persistence and notification fan-out. Retries run as an explicit loop in
//! one spawned task; every attempt re-reads and re-commits the job row, so
//! a crash mid-backoff leaves the last committed state intact.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, info, warn};

use crosscheck_core::{
    reconcile, ClientId, DateRange, JobId, ResultSummary, SourceError, WebhookId,
};
use crosscheck_db::models::{Connector, Job, JobStatus, NewJob, WebhookEventKind};
use crosscheck_db::{crypto, ConnectorStore, DbError, JobStore};
use crosscheck_ingest::source::{build_source, Source};
use crosscheck_ingest::{FetchCache, SourceConfig};
use crosscheck_webhooks::{WebhookDispatcher, WebhookError};

use crate::email::EmailNotifier;
use crate::retry::RetryPolicy;

/// Default lookback window when the trigger does not specify one.
const DEFAULT_DAYS: i32 = 30;

/// Default retry budget when the trigger does not specify one.
const DEFAULT_MAX_RETRIES: i32 = 3;

/// Parameters accepted from the trigger path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    pub days: Option<i32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub max_retries: Option<i32>,
}

/// Errors returned synchronously from the trigger entry points.
///
/// Attempt failures never surface here — they become job state transitions.
#[derive(Debug, Error)]
pub enum JobError {
    /// The referenced job does not exist.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Manual retry requested for a job that is not in `Failed` state.
    #[error("cannot retry a job in status {status}")]
    NotRetryable { status: JobStatus },

    /// Manual retry requested but the retry budget is spent.
    #[error("job has exceeded its retries ({retry_count}/{max_retries})")]
    RetriesExhausted { retry_count: i32, max_retries: i32 },

    /// The job store rejected a read or write.
    #[error(transparent)]
    Storage(#[from] DbError),
}

/// What one attempt produced, internally.
enum Outcome {
    /// Terminal state written (or the attempt was abandoned); stop.
    Finished,
    /// Retryable failure persisted; sleep, then run the next attempt.
    RetryAfter(std::time::Duration),
}

/// Failure of one attempt, classified for the retry policy.
#[derive(Debug)]
enum AttemptError {
    /// A classified source failure (configuration / API / validation).
    Source(SourceError),
    /// Anything else; treated as potentially transient and retried with the
    /// same backoff as API errors.
    Unexpected(String),
}

impl From<SourceError> for AttemptError {
    fn from(err: SourceError) -> Self {
        Self::Source(err)
    }
}

impl From<DbError> for AttemptError {
    fn from(err: DbError) -> Self {
        Self::Unexpected(err.to_string())
    }
}

/// The orchestrator. Cheap to clone; each job runs as an independent
/// spawned task and jobs never share state beyond the stores.
#[derive(Clone)]
pub struct JobExecutor {
    jobs: Arc<dyn JobStore>,
    connectors: Arc<dyn ConnectorStore>,
    webhooks: Arc<WebhookDispatcher>,
    email: Arc<EmailNotifier>,
    encryption_key: Vec<u8>,
    retry_policy: RetryPolicy,
}

impl JobExecutor {
    /// Wire the orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        connectors: Arc<dyn ConnectorStore>,
        webhooks: Arc<WebhookDispatcher>,
        email: Arc<EmailNotifier>,
        encryption_key: Vec<u8>,
    ) -> Self {
        Self {
            jobs,
            connectors,
            webhooks,
            email,
            encryption_key,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the backoff policy (tests shrink the base).
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Create a job row and start attempt 1 in the background. Returns the
    /// just-created job (status `Running`) immediately.
    pub async fn run_job(
        &self,
        client_id: ClientId,
        request: JobRequest,
    ) -> Result<Job, JobError> {
        let config_snapshot = serde_json::to_value(&request).ok();
        let job = self
            .jobs
            .create(NewJob {
                client_id: client_id.into_uuid(),
                days: request.days.unwrap_or(DEFAULT_DAYS),
                start_date: request.start_date,
                end_date: request.end_date,
                config: config_snapshot,
                max_retries: request.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            })
            .await?;

        info!(
            target: "job_executor",
            job_id = %job.id,
            client_id = %client_id,
            days = job.days,
            max_retries = job.max_retries,
            "Created reconciliation job"
        );

        self.spawn(JobId::from(job.id), 1);
        Ok(job)
    }

    /// Manually resume a failed job at `retry_count + 1`.
    ///
    /// Rejected with a descriptive error — never silently ignored — when the
    /// job is not `Failed` or its retry budget is spent.
    pub async fn retry_job(&self, job_id: JobId) -> Result<Job, JobError> {
        let mut job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))?;

        if job.status != JobStatus::Failed {
            return Err(JobError::NotRetryable { status: job.status });
        }
        if !job.can_retry() {
            return Err(JobError::RetriesExhausted {
                retry_count: job.retry_count,
                max_retries: job.max_retries,
            });
        }

        job.status = JobStatus::Running;
        job.retry_count += 1;
        job.completed_at = None;
        self.jobs.update(&job).await?;

        info!(
            target: "job_executor",
            job_id = %job.id,
            client_id = %job.client_id,
            attempt = job.retry_count,
            "Manually retrying job"
        );

        self.spawn(job_id, job.retry_count as u32);
        Ok(job)
    }

    /// Exercise the webhook channel against a caller-supplied job snapshot.
    pub async fn send_test_webhook(
        &self,
        webhook_id: WebhookId,
        job: &Job,
    ) -> Result<bool, WebhookError> {
        self.webhooks.send_test(webhook_id, job).await
    }

    fn spawn(&self, job_id: JobId, first_attempt: u32) {
        let executor = self.clone();
        tokio::spawn(async move {
            executor.execute(job_id, first_attempt).await;
        });
    }

    /// Run the attempt loop for one job until a terminal state is written.
    ///
    /// Retries are strictly sequential: attempt `n + 1` starts only after
    /// attempt `n`'s state is committed and the backoff has elapsed. The
    /// fetch cache is scoped to this invocation.
    pub async fn execute(&self, job_id: JobId, first_attempt: u32) {
        let cache = FetchCache::default();
        let mut attempt = first_attempt;
        loop {
            match self.run_attempt(job_id, attempt, &cache).await {
                Outcome::Finished => return,
                Outcome::RetryAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn run_attempt(&self, job_id: JobId, attempt: u32, cache: &FetchCache) -> Outcome {
        // Fresh read per attempt: no in-memory job state survives a restart.
        let job = match self.jobs.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                error!(target: "job_executor", job_id = %job_id, "Job row disappeared");
                return Outcome::Finished;
            }
            Err(e) => {
                error!(
                    target: "job_executor",
                    job_id = %job_id,
                    error = %e,
                    "Failed to load job for attempt"
                );
                return Outcome::Finished;
            }
        };

        info!(
            target: "job_executor",
            job_id = %job.id,
            client_id = %job.client_id,
            attempt,
            "Starting reconciliation attempt"
        );

        // job.started fires once per run, never on retries.
        if attempt == 1 {
            self.webhooks.notify(WebhookEventKind::JobStarted, &job).await;
        }

        match self.attempt_reconciliation(&job, attempt, cache).await {
            Ok(summary) => self.complete(job, summary).await,
            Err(AttemptError::Source(err)) if !matches!(err, SourceError::Api { .. }) => {
                // Configuration and validation failures would fail the same
                // way again; terminal immediately.
                error!(
                    target: "job_executor",
                    job_id = %job.id,
                    attempt,
                    error = %err,
                    error_kind = "configuration",
                    "Attempt failed with non-retryable error"
                );
                self.fail(job, err.to_string(), None).await
            }
            Err(AttemptError::Source(err)) => {
                let cause = err.to_string();
                error!(
                    target: "job_executor",
                    job_id = %job.id,
                    attempt,
                    error = %cause,
                    error_kind = "api",
                    "Attempt failed with provider error"
                );
                if err.is_retryable() && (attempt as i32) < job.max_retries {
                    self.persist_retrying(job, attempt, &cause).await
                } else {
                    self.fail(
                        job,
                        format!("Failed after {attempt} attempts. Last error: {cause}"),
                        Some(attempt),
                    )
                    .await
                }
            }
            Err(AttemptError::Unexpected(cause)) => {
                error!(
                    target: "job_executor",
                    job_id = %job.id,
                    attempt,
                    error = %cause,
                    error_kind = "unexpected",
                    "Attempt failed unexpectedly"
                );
                if (attempt as i32) < job.max_retries {
                    self.persist_retrying(job, attempt, &cause).await
                } else {
                    self.fail(
                        job,
                        format!("Failed after {attempt} attempts. Last error: {cause}"),
                        Some(attempt),
                    )
                    .await
                }
            }
        }
    }

    /// Steps 2–5 of one attempt: everything that can fail retryably.
    async fn attempt_reconciliation(
        &self,
        job: &Job,
        attempt: u32,
        cache: &FetchCache,
    ) -> Result<ResultSummary, AttemptError> {
        let connectors = self
            .connectors
            .list_by_client(ClientId::from(job.client_id))
            .await?;
        let (analytics_conn, backend_conn) =
            select_connectors(&connectors).map_err(AttemptError::Source)?;

        let range = DateRange::resolve(
            i64::from(job.days),
            job.start_date.as_deref(),
            job.end_date.as_deref(),
        )?;

        let analytics = self.build_source(analytics_conn)?;
        let backend = self.build_source(backend_conn)?;

        let analytics_records = cache.fetch(analytics.as_ref(), &range).await?;
        let backend_records = cache.fetch(backend.as_ref(), &range).await?;

        info!(
            target: "job_executor",
            job_id = %job.id,
            ga4_records = analytics_records.len(),
            backend_records = backend_records.len(),
            "Fetched both sides"
        );

        let report = reconcile(&backend_records, &analytics_records);
        Ok(report.into_summary(
            i64::from(job.days),
            job.start_date.clone(),
            job.end_date.clone(),
            attempt,
        ))
    }

    /// Decrypt a connector's stored config and build its adapter.
    fn build_source(&self, connector: &Connector) -> Result<Box<dyn Source>, AttemptError> {
        let config_json = crypto::decrypt_secret(&connector.config_encrypted, &self.encryption_key)
            .map_err(|e| {
                AttemptError::Unexpected(format!(
                    "failed to decrypt config for connector {}: {e}",
                    connector.id
                ))
            })?;
        let config = SourceConfig::parse(connector.kind.as_str(), &config_json)?;
        Ok(build_source(config)?)
    }

    async fn complete(&self, mut job: Job, summary: ResultSummary) -> Outcome {
        let summary_json: Option<JsonValue> = serde_json::to_value(&summary).ok();
        job.status = JobStatus::Completed;
        job.result_summary = summary_json;
        job.logs = None;
        job.completed_at = Some(Utc::now());

        if let Err(e) = self.jobs.update(&job).await {
            error!(
                target: "job_executor",
                job_id = %job.id,
                error = %e,
                "Failed to persist completed state"
            );
            return Outcome::Finished;
        }

        info!(
            target: "job_executor",
            job_id = %job.id,
            client_id = %job.client_id,
            match_rate = summary.match_rate,
            missing_count = summary.missing_count,
            "Job completed"
        );

        self.webhooks
            .notify(WebhookEventKind::JobCompleted, &job)
            .await;
        self.email.notify_completed(&job, &summary).await;
        Outcome::Finished
    }

    /// Write the terminal `Failed` state and fire failure notifications.
    async fn fail(&self, mut job: Job, cause: String, attempt: Option<u32>) -> Outcome {
        job.status = JobStatus::Failed;
        if let Some(attempt) = attempt {
            job.retry_count = (attempt as i32).min(job.max_retries);
        }
        job.logs = Some(cause.clone());
        job.completed_at = Some(Utc::now());

        if let Err(e) = self.jobs.update(&job).await {
            error!(
                target: "job_executor",
                job_id = %job.id,
                error = %e,
                "Failed to persist failed state"
            );
            return Outcome::Finished;
        }

        error!(
            target: "job_executor",
            job_id = %job.id,
            client_id = %job.client_id,
            error = %cause,
            "Job failed"
        );

        self.webhooks.notify(WebhookEventKind::JobFailed, &job).await;
        self.email.notify_failed(&job, &cause).await;
        Outcome::Finished
    }

    /// Persist the `Retrying` state and hand back the backoff to sleep.
    async fn persist_retrying(&self, mut job: Job, attempt: u32, cause: &str) -> Outcome {
        let delay = self.retry_policy.backoff(attempt);
        job.status = JobStatus::Retrying;
        job.retry_count = (attempt as i32).min(job.max_retries);
        job.logs = Some(format!("Attempt {attempt} failed (retryable): {cause}"));

        if let Err(e) = self.jobs.update(&job).await {
            error!(
                target: "job_executor",
                job_id = %job.id,
                error = %e,
                "Failed to persist retrying state"
            );
            return Outcome::Finished;
        }

        warn!(
            target: "job_executor",
            job_id = %job.id,
            attempt,
            next_attempt = attempt + 1,
            max_retries = job.max_retries,
            backoff_ms = delay.as_millis() as u64,
            "Retrying job after backoff"
        );
        Outcome::RetryAfter(delay)
    }
}

/// Pick the client's analytics and backend connectors; anything other than
/// exactly one of each is a structural misconfiguration.
fn select_connectors(connectors: &[Connector]) -> Result<(&Connector, &Connector), SourceError> {
    let mut analytics = None;
    let mut backend = None;

    for connector in connectors {
        if connector.kind.is_analytics() {
            if analytics.replace(connector).is_some() {
                return Err(SourceError::validation(
                    "multiple GA4 connectors configured",
                ));
            }
        } else if backend.replace(connector).is_some() {
            return Err(SourceError::validation(
                "multiple backend (Shopify/WooCommerce) connectors configured",
            ));
        }
    }

    match (analytics, backend) {
        (Some(a), Some(b)) => Ok((a, b)),
        (analytics, backend) => {
            let mut missing = Vec::new();
            if analytics.is_none() {
                missing.push("GA4");
            }
            if backend.is_none() {
                missing.push("backend (Shopify/WooCommerce)");
            }
            Err(SourceError::validation(format!(
                "missing connectors: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crosscheck_db::models::ConnectorKind;
    use uuid::Uuid;

    fn connector(kind: ConnectorKind) -> Connector {
        Connector {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            kind,
            config_encrypted: "irrelevant".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn selects_one_of_each_side() {
        let connectors = vec![
            connector(ConnectorKind::Shopify),
            connector(ConnectorKind::Ga4),
        ];
        let (analytics, backend) = select_connectors(&connectors).unwrap();
        assert_eq!(analytics.kind, ConnectorKind::Ga4);
        assert_eq!(backend.kind, ConnectorKind::Shopify);
    }

    #[test]
    fn missing_sides_are_named() {
        let err = select_connectors(&[]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("GA4"));
        assert!(message.contains("backend"));
        assert!(!err.is_retryable());

        let err = select_connectors(&[connector(ConnectorKind::Ga4)]).unwrap_err();
        assert!(err.to_string().contains("backend"));
        assert!(!err.to_string().contains("GA4,"));
    }

    #[test]
    fn duplicate_connectors_are_rejected() {
        let err = select_connectors(&[
            connector(ConnectorKind::Ga4),
            connector(ConnectorKind::Ga4),
            connector(ConnectorKind::Shopify),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("multiple GA4"));

        let err = select_connectors(&[
            connector(ConnectorKind::Ga4),
            connector(ConnectorKind::Shopify),
            connector(ConnectorKind::Woocommerce),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("multiple backend"));
    }
}
