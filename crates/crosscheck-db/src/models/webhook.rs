//! Webhook models: delivery targets and the append-only delivery audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Response bodies stored on delivery records are truncated to this length.
pub const RESPONSE_BODY_MAX_CHARS: usize = 1000;

/// Job lifecycle events a webhook can subscribe to.
///
/// The string forms (`job.started`, ...) are a compatibility contract with
/// external consumers and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventKind {
    #[serde(rename = "job.started")]
    JobStarted,
    #[serde(rename = "job.completed")]
    JobCompleted,
    #[serde(rename = "job.failed")]
    JobFailed,
}

impl WebhookEventKind {
    /// The wire name of this event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobStarted => "job.started",
            Self::JobCompleted => "job.completed",
            Self::JobFailed => "job.failed",
        }
    }

    /// All known event names.
    #[must_use]
    pub fn all() -> &'static [WebhookEventKind] {
        &[Self::JobStarted, Self::JobCompleted, Self::JobFailed]
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WebhookEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job.started" => Ok(Self::JobStarted),
            "job.completed" => Ok(Self::JobCompleted),
            "job.failed" => Ok(Self::JobFailed),
            _ => Err(format!("unknown webhook event: {s}")),
        }
    }
}

/// Delivery state of a webhook target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    /// Deliveries proceed.
    Active,
    /// Administratively paused.
    Inactive,
    /// Tripped by the failure-count circuit breaker; requires manual
    /// reactivation.
    Failed,
}

impl WebhookStatus {
    /// Get the string representation used in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WebhookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown webhook status: {s}")),
        }
    }
}

/// A client-scoped webhook delivery target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub client_id: Uuid,
    pub url: String,
    /// AES-256-GCM ciphertext of the HMAC signing secret, when configured.
    pub secret_encrypted: Option<String>,
    /// Subscribed event names; empty means all events.
    pub events: Vec<String>,
    pub status: WebhookStatus,
    /// Lifetime consecutive-failure counter; reset by a 2xx delivery or by
    /// manual reactivation.
    pub failure_count: i32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Webhook {
    /// Whether this webhook wants the given event (empty set = all events).
    #[must_use]
    pub fn subscribes_to(&self, event: WebhookEventKind) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event.as_str())
    }
}

/// One webhook delivery attempt. Append-only: never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub job_id: Option<Uuid>,
    pub event: String,
    /// The exact JSON body that was sent.
    pub payload: JsonValue,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Parameters for appending a delivery record.
#[derive(Debug, Clone)]
pub struct NewWebhookDelivery {
    pub webhook_id: Uuid,
    pub job_id: Option<Uuid>,
    pub event: WebhookEventKind,
    pub payload: JsonValue,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub success: bool,
}

impl NewWebhookDelivery {
    /// Materialize the audit row, truncating the response body and stamping
    /// `delivered_at` for successful attempts.
    #[must_use]
    pub fn into_delivery(self) -> WebhookDelivery {
        let now = Utc::now();
        WebhookDelivery {
            id: Uuid::new_v4(),
            webhook_id: self.webhook_id,
            job_id: self.job_id,
            event: self.event.as_str().to_string(),
            payload: self.payload,
            status_code: self.status_code,
            response_body: self
                .response_body
                .map(|b| b.chars().take(RESPONSE_BODY_MAX_CHARS).collect()),
            error_message: self.error_message,
            success: self.success,
            created_at: now,
            delivered_at: self.success.then_some(now),
        }
    }
}
