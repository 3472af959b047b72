//! Webhook delivery execution.
//!
//! For each active webhook subscribed to a fired event: POST the signed
//! payload, append a delivery record (success or failure), and maintain the
//! failure counter that backs the circuit breaker. Delivery is best-effort
//! and never blocks the job state machine.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info, warn};

use crosscheck_core::{ClientId, WebhookId};
use crosscheck_db::models::{Job, NewWebhookDelivery, Webhook, WebhookEventKind, WebhookStatus};
use crosscheck_db::{crypto as at_rest, WebhookStore};

use crate::crypto;
use crate::error::WebhookError;
use crate::payload::JobEventPayload;
use crate::{DEFAULT_TIMEOUT_SECS, FAILURE_THRESHOLD};

/// Dispatches job lifecycle events to a client's webhooks.
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    http_client: Client,
    /// Key for decrypting webhook secrets at rest.
    encryption_key: Vec<u8>,
    failure_threshold: i32,
}

impl WebhookDispatcher {
    /// Build a dispatcher with the default timeout and failure threshold.
    pub fn new(
        store: Arc<dyn WebhookStore>,
        encryption_key: Vec<u8>,
    ) -> Result<Self, WebhookError> {
        Self::with_timeout(store, encryption_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Build a dispatcher with an explicit per-delivery timeout.
    pub fn with_timeout(
        store: Arc<dyn WebhookStore>,
        encryption_key: Vec<u8>,
        timeout: Duration,
    ) -> Result<Self, WebhookError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::HttpClient(e.to_string()))?;

        Ok(Self {
            store,
            http_client,
            encryption_key,
            failure_threshold: FAILURE_THRESHOLD,
        })
    }

    /// Override the circuit-breaker threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: i32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Fire an event to every matching webhook of the job's client.
    ///
    /// Best-effort: store and delivery failures are logged, never raised.
    /// No ordering is guaranteed between webhooks.
    pub async fn notify(&self, event: WebhookEventKind, job: &Job) {
        let client_id = ClientId::from(job.client_id);
        let webhooks = match self.store.active_for_client(client_id).await {
            Ok(hooks) => hooks,
            Err(e) => {
                error!(
                    target: "webhook_delivery",
                    job_id = %job.id,
                    client_id = %client_id,
                    error = %e,
                    "Failed to load webhooks for event"
                );
                return;
            }
        };

        let matching: Vec<Webhook> = webhooks
            .into_iter()
            .filter(|w| w.subscribes_to(event))
            .collect();

        if matching.is_empty() {
            debug!(
                target: "webhook_delivery",
                job_id = %job.id,
                event = %event,
                "No webhooks subscribed to event"
            );
            return;
        }

        info!(
            target: "webhook_delivery",
            job_id = %job.id,
            event = %event,
            webhook_count = matching.len(),
            "Dispatching event to webhooks"
        );

        for webhook in matching {
            self.deliver(&webhook, event, job).await;
        }
    }

    /// Exercise the dispatcher against one webhook with a caller-supplied
    /// job snapshot. Used by the operator "test webhook" path; the job never
    /// touches the job store.
    pub async fn send_test(&self, webhook_id: WebhookId, job: &Job) -> Result<bool, WebhookError> {
        let webhook = self
            .store
            .find(webhook_id)
            .await?
            .ok_or(WebhookError::NotFound(webhook_id))?;
        Ok(self
            .deliver(&webhook, WebhookEventKind::JobCompleted, job)
            .await)
    }

    /// Manually reactivate a tripped webhook, resetting its failure counter.
    pub async fn reactivate(&self, webhook_id: WebhookId) -> Result<Webhook, WebhookError> {
        let webhook = self.store.reactivate(webhook_id).await?;
        info!(
            target: "webhook_delivery",
            webhook_id = %webhook_id,
            "Webhook reactivated"
        );
        Ok(webhook)
    }

    /// Execute one delivery attempt. Returns whether the receiver accepted.
    async fn deliver(&self, webhook: &Webhook, event: WebhookEventKind, job: &Job) -> bool {
        if webhook.status != WebhookStatus::Active {
            warn!(
                target: "webhook_delivery",
                webhook_id = %webhook.id,
                status = %webhook.status,
                "Skipping delivery to non-active webhook"
            );
            return false;
        }

        let payload = JobEventPayload::build(event, job);
        let payload_json = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                error!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    error = %e,
                    "Failed to serialize webhook payload"
                );
                return false;
            }
        };
        // Sign and send the exact bytes we persist on the delivery record.
        let body = payload_json.to_string().into_bytes();

        let mut request = self
            .http_client
            .post(&webhook.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", event.as_str())
            .header("X-Webhook-ID", webhook.id.to_string());

        if let Some(ref secret_encrypted) = webhook.secret_encrypted {
            match at_rest::decrypt_secret(secret_encrypted, &self.encryption_key) {
                Ok(secret) => {
                    request = request.header(
                        "X-Webhook-Signature",
                        crypto::signature_header(&secret, &body),
                    );
                }
                Err(e) => {
                    warn!(
                        target: "webhook_delivery",
                        webhook_id = %webhook.id,
                        error = %e,
                        "Failed to decrypt webhook secret, delivering unsigned"
                    );
                }
            }
        }

        match request.body(body).send().await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let response_body = response.text().await.unwrap_or_default();
                let success = (200..300).contains(&status_code);

                self.append_delivery(NewWebhookDelivery {
                    webhook_id: webhook.id,
                    job_id: Some(job.id),
                    event,
                    payload: payload_json,
                    status_code: Some(i32::from(status_code)),
                    response_body: Some(response_body),
                    error_message: (!success).then(|| format!("HTTP {status_code}")),
                    success,
                })
                .await;

                if success {
                    self.handle_success(webhook, event, status_code).await;
                } else {
                    self.handle_failure(webhook, event, &format!("HTTP {status_code}"))
                        .await;
                }
                success
            }
            Err(e) => {
                let error_message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    format!("request error: {e}")
                };

                self.append_delivery(NewWebhookDelivery {
                    webhook_id: webhook.id,
                    job_id: Some(job.id),
                    event,
                    payload: payload_json,
                    status_code: None,
                    response_body: None,
                    error_message: Some(error_message.clone()),
                    success: false,
                })
                .await;

                self.handle_failure(webhook, event, &error_message).await;
                false
            }
        }
    }

    async fn append_delivery(&self, delivery: NewWebhookDelivery) {
        let webhook_id = delivery.webhook_id;
        if let Err(e) = self.store.append_delivery(delivery).await {
            error!(
                target: "webhook_delivery",
                webhook_id = %webhook_id,
                error = %e,
                "Failed to record delivery attempt"
            );
        }
    }

    async fn handle_success(&self, webhook: &Webhook, event: WebhookEventKind, status_code: u16) {
        info!(
            target: "webhook_delivery",
            webhook_id = %webhook.id,
            event = %event,
            status_code,
            "Webhook delivered"
        );
        if let Err(e) = self.store.record_success(WebhookId::from(webhook.id)).await {
            error!(
                target: "webhook_delivery",
                webhook_id = %webhook.id,
                error = %e,
                "Failed to reset webhook failure counter"
            );
        }
    }

    async fn handle_failure(&self, webhook: &Webhook, event: WebhookEventKind, cause: &str) {
        warn!(
            target: "webhook_delivery",
            webhook_id = %webhook.id,
            event = %event,
            error = %cause,
            "Webhook delivery failed"
        );
        match self
            .store
            .record_failure(WebhookId::from(webhook.id), self.failure_threshold)
            .await
        {
            Ok(updated) if updated.status == WebhookStatus::Failed => {
                error!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    failure_count = updated.failure_count,
                    "Webhook disabled after repeated failures"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    target: "webhook_delivery",
                    webhook_id = %webhook.id,
                    error = %e,
                    "Failed to record webhook failure"
                );
            }
        }
    }
}
