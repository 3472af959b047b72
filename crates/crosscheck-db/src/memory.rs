//! In-memory store implementation.
//!
//! Backs the orchestrator test suites and local development. State lives in
//! `RwLock`-guarded maps; the webhook counter operations take the write lock
//! for the whole read-modify-write, matching the atomicity the Postgres
//! implementation gets from single UPDATE statements.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crosscheck_core::{ClientId, JobId, WebhookId};

use crate::error::DbError;
use crate::models::{
    ClientUser, Connector, Job, NewJob, NewWebhookDelivery, Webhook, WebhookDelivery,
    WebhookStatus,
};
use crate::store::{ClientDirectory, ConnectorStore, JobStore, WebhookStore};

/// All four store interfaces over in-process state. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryStores {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: RwLock<HashMap<Uuid, Job>>,
    connectors: RwLock<Vec<Connector>>,
    users: RwLock<Vec<ClientUser>>,
    webhooks: RwLock<HashMap<Uuid, Webhook>>,
    deliveries: RwLock<Vec<WebhookDelivery>>,
}

impl MemoryStores {
    /// An empty store set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a connector row.
    pub async fn add_connector(&self, connector: Connector) {
        self.inner.connectors.write().await.push(connector);
    }

    /// Seed a client user row.
    pub async fn add_user(&self, user: ClientUser) {
        self.inner.users.write().await.push(user);
    }

    /// Seed a webhook row.
    pub async fn add_webhook(&self, webhook: Webhook) {
        self.inner
            .webhooks
            .write()
            .await
            .insert(webhook.id, webhook);
    }

    /// All recorded delivery attempts for one webhook, oldest first.
    pub async fn deliveries_for(&self, webhook_id: WebhookId) -> Vec<WebhookDelivery> {
        self.inner
            .deliveries
            .read()
            .await
            .iter()
            .filter(|d| d.webhook_id == *webhook_id.as_uuid())
            .cloned()
            .collect()
    }

    /// Every delivery attempt recorded so far, oldest first.
    pub async fn all_deliveries(&self) -> Vec<WebhookDelivery> {
        self.inner.deliveries.read().await.clone()
    }
}

#[async_trait]
impl JobStore for MemoryStores {
    async fn create(&self, new_job: NewJob) -> Result<Job, DbError> {
        let job = new_job.into_job();
        self.inner.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, DbError> {
        Ok(self.inner.jobs.read().await.get(id.as_uuid()).cloned())
    }

    async fn update(&self, job: &Job) -> Result<(), DbError> {
        let mut jobs = self.inner.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                Ok(())
            }
            None => Err(DbError::NotFound(format!("job {}", job.id))),
        }
    }
}

#[async_trait]
impl ConnectorStore for MemoryStores {
    async fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Connector>, DbError> {
        Ok(self
            .inner
            .connectors
            .read()
            .await
            .iter()
            .filter(|c| c.client_id == *client_id.as_uuid())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ClientDirectory for MemoryStores {
    async fn active_users(&self, client_id: ClientId) -> Result<Vec<ClientUser>, DbError> {
        Ok(self
            .inner
            .users
            .read()
            .await
            .iter()
            .filter(|u| {
                u.client_id == *client_id.as_uuid()
                    && u.status == crate::models::ClientUserStatus::Active
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WebhookStore for MemoryStores {
    async fn active_for_client(&self, client_id: ClientId) -> Result<Vec<Webhook>, DbError> {
        Ok(self
            .inner
            .webhooks
            .read()
            .await
            .values()
            .filter(|w| w.client_id == *client_id.as_uuid() && w.status == WebhookStatus::Active)
            .cloned()
            .collect())
    }

    async fn find(&self, id: WebhookId) -> Result<Option<Webhook>, DbError> {
        Ok(self.inner.webhooks.read().await.get(id.as_uuid()).cloned())
    }

    async fn append_delivery(
        &self,
        delivery: NewWebhookDelivery,
    ) -> Result<WebhookDelivery, DbError> {
        let row = delivery.into_delivery();
        self.inner.deliveries.write().await.push(row.clone());
        Ok(row)
    }

    async fn record_success(&self, id: WebhookId) -> Result<(), DbError> {
        let mut webhooks = self.inner.webhooks.write().await;
        let webhook = webhooks
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("webhook {id}")))?;
        webhook.failure_count = 0;
        webhook.last_success = Some(Utc::now());
        webhook.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn record_failure(&self, id: WebhookId, threshold: i32) -> Result<Webhook, DbError> {
        let mut webhooks = self.inner.webhooks.write().await;
        let webhook = webhooks
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("webhook {id}")))?;
        webhook.failure_count += 1;
        webhook.last_failure = Some(Utc::now());
        if webhook.failure_count >= threshold {
            webhook.status = WebhookStatus::Failed;
        }
        webhook.updated_at = Some(Utc::now());
        Ok(webhook.clone())
    }

    async fn reactivate(&self, id: WebhookId) -> Result<Webhook, DbError> {
        let mut webhooks = self.inner.webhooks.write().await;
        let webhook = webhooks
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("webhook {id}")))?;
        webhook.status = WebhookStatus::Active;
        webhook.failure_count = 0;
        webhook.updated_at = Some(Utc::now());
        Ok(webhook.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;

    #[tokio::test]
    async fn job_crud_roundtrip() {
        let stores = MemoryStores::new();
        let client = ClientId::new();

        let job = stores
            .create(NewJob::for_client(client.into_uuid()))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Running);

        let mut fetched = stores.get(JobId::from(job.id)).await.unwrap().unwrap();
        fetched.status = JobStatus::Completed;
        stores.update(&fetched).await.unwrap();

        let again = stores.get(JobId::from(job.id)).await.unwrap().unwrap();
        assert_eq!(again.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn failure_counter_trips_at_threshold() {
        let stores = MemoryStores::new();
        let webhook = Webhook {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            url: "https://example.com".to_string(),
            secret_encrypted: None,
            events: vec![],
            status: WebhookStatus::Active,
            failure_count: 0,
            last_success: None,
            last_failure: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let id = WebhookId::from(webhook.id);
        stores.add_webhook(webhook).await;

        for n in 1..=2 {
            let updated = stores.record_failure(id, 3).await.unwrap();
            assert_eq!(updated.failure_count, n);
            assert_eq!(updated.status, WebhookStatus::Active);
        }
        let tripped = stores.record_failure(id, 3).await.unwrap();
        assert_eq!(tripped.status, WebhookStatus::Failed);

        let restored = stores.reactivate(id).await.unwrap();
        assert_eq!(restored.status, WebhookStatus::Active);
        assert_eq!(restored.failure_count, 0);
    }
}
