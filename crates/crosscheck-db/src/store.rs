//! Store interfaces consumed by the orchestrator.
//!
//! Persistence stays behind these traits: the orchestrator never sees a
//! connection pool. [`crate::postgres::PgStores`] is the durable
//! implementation; [`crate::memory::MemoryStores`] backs tests and local
//! development.

use async_trait::async_trait;

use crosscheck_core::{ClientId, JobId, WebhookId};

use crate::error::DbError;
use crate::models::{
    ClientUser, Connector, Job, NewJob, NewWebhookDelivery, Webhook, WebhookDelivery,
};

/// Durable state for job rows. Every method is atomic: a crash between two
/// calls leaves the last committed write intact.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job row, assigning identity and timestamps.
    async fn create(&self, new_job: NewJob) -> Result<Job, DbError>;

    /// Fetch a job by id.
    async fn get(&self, id: JobId) -> Result<Option<Job>, DbError>;

    /// Persist the mutable fields of a job (status, retry bookkeeping,
    /// summary, logs, completion timestamp).
    async fn update(&self, job: &Job) -> Result<(), DbError>;
}

/// Read access to a client's stored connectors.
#[async_trait]
pub trait ConnectorStore: Send + Sync {
    /// All connectors bound to the client, configs still encrypted.
    async fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Connector>, DbError>;
}

/// Recipient lookup for the email channel.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Active users mapped to the client.
    async fn active_users(&self, client_id: ClientId) -> Result<Vec<ClientUser>, DbError>;
}

/// Webhook targets and the append-only delivery audit log.
///
/// Counter mutation is atomic per delivery: concurrent jobs for the same
/// client can deliver to the same webhook, so increments/resets are single
/// read-modify-write operations, never get-then-update round trips.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// All `Active` webhooks for the client.
    async fn active_for_client(&self, client_id: ClientId) -> Result<Vec<Webhook>, DbError>;

    /// Fetch one webhook regardless of status.
    async fn find(&self, id: WebhookId) -> Result<Option<Webhook>, DbError>;

    /// Append one delivery attempt to the audit log.
    async fn append_delivery(
        &self,
        delivery: NewWebhookDelivery,
    ) -> Result<WebhookDelivery, DbError>;

    /// Reset failure bookkeeping after a 2xx delivery.
    async fn record_success(&self, id: WebhookId) -> Result<(), DbError>;

    /// Increment the failure counter and stamp `last_failure`; once the
    /// counter reaches `threshold` the webhook is forced to `Failed`.
    /// Returns the updated row so callers can observe the trip.
    async fn record_failure(&self, id: WebhookId, threshold: i32) -> Result<Webhook, DbError>;

    /// Manual reactivation: status back to `Active`, failure counter zeroed.
    async fn reactivate(&self, id: WebhookId) -> Result<Webhook, DbError>;
}
