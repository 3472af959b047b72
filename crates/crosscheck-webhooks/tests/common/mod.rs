//! Shared fixtures for the dispatcher integration suite.

use chrono::Utc;
use uuid::Uuid;

use crosscheck_db::crypto::encrypt_secret;
use crosscheck_db::models::{Job, JobStatus, NewJob, Webhook, WebhookStatus};

/// At-rest encryption key used across the suite.
pub const TEST_KEY: [u8; 32] = [0x42u8; 32];

/// A webhook row pointing at `url`, optionally signing with `secret`.
pub fn webhook(client_id: Uuid, url: &str, secret: Option<&str>, events: Vec<&str>) -> Webhook {
    Webhook {
        id: Uuid::new_v4(),
        client_id,
        url: url.to_string(),
        secret_encrypted: secret.map(|s| encrypt_secret(s, &TEST_KEY).unwrap()),
        events: events.into_iter().map(String::from).collect(),
        status: WebhookStatus::Active,
        failure_count: 0,
        last_success: None,
        last_failure: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

/// A completed job carrying a small result summary.
pub fn completed_job(client_id: Uuid) -> Job {
    let mut job = NewJob::for_client(client_id).into_job();
    job.status = JobStatus::Completed;
    job.result_summary = Some(serde_json::json!({
        "match_rate": 66.67,
        "missing_count": 1,
        "missing_ids": ["C"],
    }));
    job.completed_at = Some(Utc::now());
    job
}
