//! Job model: one reconciliation attempt lineage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Hard ceiling for the per-job retry budget.
pub const MAX_RETRIES_CEILING: i32 = 5;

/// Default retry budget when the trigger does not specify one.
const DEFAULT_MAX_RETRIES: i32 = 3;

/// Default lookback window in days.
const DEFAULT_DAYS: i32 = 30;

/// Lifecycle state of a job.
///
/// Transitions are monotonic: `Pending → Running → {Completed | Retrying |
/// Failed}`, `Retrying → Running`, and nothing ever returns to `Pending`.
/// `Completed` is absorbing; `Failed` is terminal except for a manual retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
}

impl JobStatus {
    /// Get the string representation used in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if this status is terminal (the run has ended).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "retrying" => Ok(Self::Retrying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown job status: {s}")),
        }
    }
}

/// One reconciliation job row.
///
/// Invariants maintained by the orchestrator: `result_summary` is non-null
/// iff `status == Completed`; `retry_count <= max_retries` after every
/// write; `completed_at` is set only on terminal transitions.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub client_id: Uuid,
    pub status: JobStatus,
    /// Lookback window in days, used when `start_date` is absent.
    pub days: i32,
    /// Optional explicit window start, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Optional explicit window end, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    /// Opaque snapshot of the resolved run configuration (audit trail).
    pub config: Option<JsonValue>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Present only when completed.
    pub result_summary: Option<JsonValue>,
    /// Last-error or retry narrative; present when retrying or failed.
    pub logs: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Whether an operator may manually retry this job.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.retry_count < self.max_retries
    }
}

/// Parameters for creating a job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub client_id: Uuid,
    pub days: i32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub config: Option<JsonValue>,
    pub max_retries: i32,
}

impl NewJob {
    /// A job request for the default 30-day window.
    #[must_use]
    pub fn for_client(client_id: Uuid) -> Self {
        Self {
            client_id,
            days: DEFAULT_DAYS,
            start_date: None,
            end_date: None,
            config: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Clamp the retry budget into the allowed 0..=5 band.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.max_retries = self.max_retries.clamp(0, MAX_RETRIES_CEILING);
        self
    }

    /// Materialize a row, assigning identity and timestamps.
    ///
    /// Jobs are created already `Running`: the trigger path spawns attempt 1
    /// immediately after the insert.
    #[must_use]
    pub fn into_job(self) -> Job {
        let now = Utc::now();
        let new = self.clamped();
        Job {
            id: Uuid::new_v4(),
            client_id: new.client_id,
            status: JobStatus::Running,
            days: new.days,
            start_date: new.start_date,
            end_date: new.end_date,
            config: new.config,
            retry_count: 0,
            max_retries: new.max_retries,
            result_summary: None,
            logs: None,
            started_at: now,
            completed_at: None,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Retrying,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<JobStatus>().is_err());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn retry_budget_is_clamped() {
        let mut new = NewJob::for_client(Uuid::new_v4());
        new.max_retries = 99;
        assert_eq!(new.clamped().max_retries, MAX_RETRIES_CEILING);

        let mut new = NewJob::for_client(Uuid::new_v4());
        new.max_retries = -3;
        assert_eq!(new.clamped().max_retries, 0);
    }

    #[test]
    fn can_retry_requires_failed_with_budget() {
        let mut job = NewJob::for_client(Uuid::new_v4()).into_job();
        assert!(!job.can_retry(), "running jobs are not retryable");

        job.status = JobStatus::Failed;
        job.retry_count = 1;
        assert!(job.can_retry());

        job.retry_count = job.max_retries;
        assert!(!job.can_retry(), "exhausted budget blocks manual retry");
    }
}
