//! The webhook wire payload.
//!
//! Field names and event name strings here are a compatibility contract
//! with external consumers; change nothing without versioning the channel.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crosscheck_db::models::{Job, JobStatus, WebhookEventKind};

/// The JSON body POSTed to a webhook for one job event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEventPayload {
    /// Event name (`job.started`, `job.completed`, `job.failed`).
    pub event: String,
    /// When the event was emitted, RFC 3339 UTC.
    pub timestamp: String,
    pub data: JobEventData,
}

/// The job snapshot carried by the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEventData {
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub status: JobStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    /// Result summary; present only on `job.completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Failure cause; present only on `job.failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEventPayload {
    /// Build the payload for a job event.
    #[must_use]
    pub fn build(event: WebhookEventKind, job: &Job) -> Self {
        let result = (event == WebhookEventKind::JobCompleted)
            .then(|| job.result_summary.clone())
            .flatten();
        let error = (event == WebhookEventKind::JobFailed)
            .then(|| job.logs.clone())
            .flatten();

        Self {
            event: event.as_str().to_string(),
            timestamp: rfc3339(Utc::now()),
            data: JobEventData {
                job_id: job.id,
                client_id: job.client_id,
                status: job.status,
                started_at: Some(rfc3339(job.started_at)),
                completed_at: job.completed_at.map(rfc3339),
                result,
                error,
            },
        }
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_db::models::NewJob;

    fn job() -> Job {
        NewJob::for_client(Uuid::new_v4()).into_job()
    }

    #[test]
    fn started_payload_has_no_result_or_error_keys() {
        let payload = JobEventPayload::build(WebhookEventKind::JobStarted, &job());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["event"], "job.started");
        assert_eq!(json["data"]["status"], "running");
        assert!(json["data"].get("result").is_none());
        assert!(json["data"].get("error").is_none());
        // completed_at is always present, null until terminal.
        assert!(json["data"]["completed_at"].is_null());
    }

    #[test]
    fn completed_payload_carries_the_summary() {
        let mut job = job();
        job.status = JobStatus::Completed;
        job.result_summary = Some(serde_json::json!({ "match_rate": 66.67 }));
        job.completed_at = Some(Utc::now());

        let payload = JobEventPayload::build(WebhookEventKind::JobCompleted, &job);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["event"], "job.completed");
        assert_eq!(json["data"]["result"]["match_rate"], 66.67);
        assert!(json["data"].get("error").is_none());
        assert!(!json["data"]["completed_at"].is_null());
    }

    #[test]
    fn failed_payload_carries_the_cause() {
        let mut job = job();
        job.status = JobStatus::Failed;
        job.logs = Some("shopify API error: rate limit exceeded".to_string());

        let payload = JobEventPayload::build(WebhookEventKind::JobFailed, &job);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["event"], "job.failed");
        assert_eq!(
            json["data"]["error"],
            "shopify API error: rate limit exceeded"
        );
        assert!(json["data"].get("result").is_none());
    }

    #[test]
    fn summary_is_not_leaked_into_failed_events() {
        let mut job = job();
        job.status = JobStatus::Failed;
        job.result_summary = Some(serde_json::json!({ "match_rate": 1.0 }));

        let payload = JobEventPayload::build(WebhookEventKind::JobFailed, &job);
        assert!(payload.data.result.is_none());
    }
}
