//! Email notification channel.
//!
//! Loads the active users of a client and sends each one a completion or
//! failure message. Best-effort on every level: a failure for one recipient
//! is logged and the fan-out continues; nothing here ever touches job state.
//!
//! Transport is behind the [`Mailer`] trait — deployments inject their SMTP
//! or API relay; [`LogMailer`] backs local development.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crosscheck_core::{ClientId, ResultSummary};
use crosscheck_db::models::Job;
use crosscheck_db::ClientDirectory;

/// Errors from the email channel.
#[derive(Debug, Error)]
pub enum EmailError {
    /// The channel is enabled but missing required settings.
    #[error("email configuration error: {0}")]
    Configuration(String),

    /// The transport rejected the message.
    #[error("failed to send email: {0}")]
    SendFailed(String),
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Message transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Transport that logs instead of sending. Local development only.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            target: "email",
            to = %message.to,
            subject = %message.subject,
            "Email (log transport, not delivered)"
        );
        Ok(())
    }
}

/// Configuration for the email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Whether notifications are sent at all.
    pub enabled: bool,
    /// From address, required when enabled.
    pub from_email: Option<String>,
    /// From display name.
    pub from_name: Option<String>,
    /// Base URL for dashboard links embedded in messages.
    pub dashboard_url: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from_email: None,
            from_name: Some("crosscheck".to_string()),
            dashboard_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Fans job outcomes out to a client's active users.
pub struct EmailNotifier {
    directory: Arc<dyn ClientDirectory>,
    mailer: Arc<dyn Mailer>,
    config: EmailConfig,
}

impl EmailNotifier {
    /// Build the notifier.
    #[must_use]
    pub fn new(
        directory: Arc<dyn ClientDirectory>,
        mailer: Arc<dyn Mailer>,
        config: EmailConfig,
    ) -> Self {
        Self {
            directory,
            mailer,
            config,
        }
    }

    /// Notify recipients that a job completed.
    pub async fn notify_completed(&self, job: &Job, summary: &ResultSummary) {
        let subject = format!(
            "Reconciliation complete ({:.1}% match)",
            summary.match_rate
        );
        let body = format!(
            "Reconciliation job {} finished.\n\n\
             Match rate: {:.2}%\n\
             Missing transactions: {}\n\n\
             View the full report: {}\n",
            job.id,
            summary.match_rate,
            summary.missing_count,
            self.results_link(job),
        );
        self.fan_out(job, subject, body).await;
    }

    /// Notify recipients that a job failed.
    pub async fn notify_failed(&self, job: &Job, error_msg: &str) {
        let subject = "Reconciliation failed".to_string();
        let body = format!(
            "Reconciliation job {} failed.\n\n\
             Error: {}\n\n\
             Review the job: {}\n",
            job.id,
            error_msg,
            self.results_link(job),
        );
        self.fan_out(job, subject, body).await;
    }

    fn results_link(&self, job: &Job) -> String {
        format!(
            "{}/dashboard/results/{}",
            self.config.dashboard_url.trim_end_matches('/'),
            job.id
        )
    }

    async fn fan_out(&self, job: &Job, subject: String, body: String) {
        if !self.config.enabled {
            debug!(target: "email", job_id = %job.id, "Email channel disabled, skipping");
            return;
        }

        let client_id = ClientId::from(job.client_id);
        let users = match self.directory.active_users(client_id).await {
            Ok(users) => users,
            Err(e) => {
                error!(
                    target: "email",
                    job_id = %job.id,
                    client_id = %client_id,
                    error = %e,
                    "Failed to load notification recipients"
                );
                return;
            }
        };

        let recipients: Vec<String> = users
            .iter()
            .filter(|u| u.is_notifiable())
            .filter_map(|u| u.email.clone())
            .collect();

        if recipients.is_empty() {
            debug!(target: "email", job_id = %job.id, "No notifiable recipients");
            return;
        }

        for to in recipients {
            let message = EmailMessage {
                to: to.clone(),
                subject: subject.clone(),
                body: body.clone(),
            };
            // One bounced recipient must not starve the rest.
            if let Err(e) = self.mailer.send(&message).await {
                error!(
                    target: "email",
                    job_id = %job.id,
                    recipient = %to,
                    error = %e,
                    "Failed to send notification email"
                );
            }
        }
    }
}
