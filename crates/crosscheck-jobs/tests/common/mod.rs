//! Shared fixtures for the orchestrator integration suite.
//!
//! One mock server hosts all provider endpoints: the GA4 token exchange
//! (`/token`), the GA4 Data API, and the Shopify Admin API. Stores are
//! in-memory; connector configs are encrypted with the suite key exactly as
//! they would be at rest.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crosscheck_core::JobId;
use crosscheck_db::crypto::encrypt_secret;
use crosscheck_db::models::{
    ClientUser, ClientUserStatus, Connector, ConnectorKind, Job, Webhook, WebhookStatus,
};
use crosscheck_db::{JobStore, MemoryStores};
use crosscheck_jobs::email::{EmailConfig, EmailError, EmailMessage, EmailNotifier, Mailer};
use crosscheck_jobs::{JobExecutor, RetryPolicy};
use crosscheck_webhooks::WebhookDispatcher;

/// At-rest encryption key used across the suite.
pub const TEST_KEY: [u8; 32] = [0x42u8; 32];

/// Throwaway RSA key signing test service-account assertions.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_service_account.pem");

/// Mailer that records every message and optionally fails one recipient.
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail_for: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_for: None,
        })
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.to.clone()).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fail_for.as_deref() == Some(message.to.as_str()) {
            return Err(EmailError::SendFailed("mailbox full".to_string()));
        }
        Ok(())
    }
}

/// Wire an executor over in-memory stores with a millisecond backoff base.
pub fn executor(stores: &MemoryStores, mailer: Arc<dyn Mailer>) -> JobExecutor {
    let dispatcher = Arc::new(
        WebhookDispatcher::new(Arc::new(stores.clone()), TEST_KEY.to_vec()).unwrap(),
    );
    let email = Arc::new(EmailNotifier::new(
        Arc::new(stores.clone()),
        mailer,
        EmailConfig {
            enabled: true,
            from_email: Some("noreply@crosscheck.dev".to_string()),
            ..EmailConfig::default()
        },
    ));
    JobExecutor::new(
        Arc::new(stores.clone()),
        Arc::new(stores.clone()),
        dispatcher,
        email,
        TEST_KEY.to_vec(),
    )
    .with_retry_policy(RetryPolicy::new(Duration::from_millis(1)))
}

/// Seed an encrypted connector row.
pub async fn seed_connector(
    stores: &MemoryStores,
    client_id: Uuid,
    kind: ConnectorKind,
    config_json: &str,
) {
    stores
        .add_connector(Connector {
            id: Uuid::new_v4(),
            client_id,
            kind,
            config_encrypted: encrypt_secret(config_json, &TEST_KEY).unwrap(),
            created_at: Utc::now(),
        })
        .await;
}

/// Seed a Shopify connector pointing at the mock server.
pub async fn seed_shopify(stores: &MemoryStores, client_id: Uuid, server: &MockServer) {
    let config = json!({ "shop_url": server.uri(), "access_token": "shpat_test" });
    seed_connector(stores, client_id, ConnectorKind::Shopify, &config.to_string()).await;
}

/// Seed a GA4 connector whose token exchange and report endpoint live on the
/// mock server.
pub async fn seed_ga4(stores: &MemoryStores, client_id: Uuid, server: &MockServer) {
    let credentials = json!({
        "type": "service_account",
        "client_email": "reporter@crosscheck-test.iam.gserviceaccount.com",
        "private_key": TEST_PRIVATE_KEY,
        "token_uri": format!("{}/token", server.uri()),
    });
    let config = json!({
        "property_id": "123456",
        "credentials_json": credentials.to_string(),
        "endpoint": server.uri(),
    });
    seed_connector(stores, client_id, ConnectorKind::Ga4, &config.to_string()).await;
}

/// Seed an active, subscribe-to-everything webhook delivering to the server.
pub async fn seed_webhook(stores: &MemoryStores, client_id: Uuid, server: &MockServer) -> Uuid {
    let id = Uuid::new_v4();
    stores
        .add_webhook(Webhook {
            id,
            client_id,
            url: format!("{}/hook", server.uri()),
            secret_encrypted: None,
            events: vec![],
            status: WebhookStatus::Active,
            failure_count: 0,
            last_success: None,
            last_failure: None,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    id
}

/// Seed an active user for the client.
pub async fn seed_user(stores: &MemoryStores, client_id: Uuid, email: &str) {
    stores
        .add_user(ClientUser {
            id: Uuid::new_v4(),
            client_id,
            email: Some(email.to_string()),
            status: ClientUserStatus::Active,
            created_at: Utc::now(),
        })
        .await;
}

/// Mount the GA4 token endpoint and a report with the given rows.
pub async fn mount_ga4(server: &MockServer, rows: Vec<serde_json::Value>) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.test-token",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/properties/123456:runReport"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": rows })))
        .mount(server)
        .await;
}

/// A GA4 report row.
pub fn ga4_row(id: &str, revenue: &str) -> serde_json::Value {
    json!({
        "dimensionValues": [
            { "value": id },
            { "value": "20240120" },
            { "value": "Chrome" },
            { "value": "desktop" },
        ],
        "metricValues": [ { "value": revenue } ],
    })
}

/// A Shopify order object.
pub fn shopify_order(name: &str, total: &str) -> serde_json::Value {
    json!({
        "name": name,
        "total_price": total,
        "financial_status": "paid",
        "payment_gateway_names": ["shopify_payments"],
    })
}

/// Mount the Shopify orders endpoint with a fixed page.
pub async fn mount_shopify(server: &MockServer, orders: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/admin/api/2023-10/orders.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "orders": orders })))
        .mount(server)
        .await;
}

/// Poll the store until the job reaches a terminal state.
pub async fn wait_terminal(stores: &MemoryStores, job_id: Uuid) -> Job {
    for _ in 0..500 {
        if let Some(job) = stores.get(JobId::from(job_id)).await.unwrap() {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}

/// Count requests the server received for a path.
pub async fn requests_to(server: &MockServer, needle: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().contains(needle))
        .count()
}
