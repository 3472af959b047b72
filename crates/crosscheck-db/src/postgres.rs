//! Postgres store implementation over `sqlx`.
//!
//! Queries are runtime-checked (`sqlx::query_as`), so the crate builds
//! without a live database. Webhook counter updates are single UPDATE
//! statements: the read-modify-write is atomic under the store's normal
//! isolation even when concurrent jobs deliver to the same webhook.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crosscheck_core::{ClientId, JobId, WebhookId};

use crate::error::DbError;
use crate::models::{
    ClientUser, Connector, Job, NewJob, NewWebhookDelivery, Webhook, WebhookDelivery,
    WebhookStatus,
};
use crate::store::{ClientDirectory, ConnectorStore, JobStore, WebhookStore};

/// All four store interfaces over a shared connection pool.
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// The underlying pool, for migrations and embedder wiring.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Row shape for webhooks; `events` arrives as JSONB and is unpacked into
/// the model's `Vec<String>`.
#[derive(sqlx::FromRow)]
struct WebhookRow {
    id: Uuid,
    client_id: Uuid,
    url: String,
    secret_encrypted: Option<String>,
    events: JsonValue,
    status: WebhookStatus,
    failure_count: i32,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<WebhookRow> for Webhook {
    fn from(row: WebhookRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            url: row.url,
            secret_encrypted: row.secret_encrypted,
            events: serde_json::from_value(row.events).unwrap_or_default(),
            status: row.status,
            failure_count: row.failure_count,
            last_success: row.last_success,
            last_failure: row.last_failure,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl JobStore for PgStores {
    async fn create(&self, new_job: NewJob) -> Result<Job, DbError> {
        let job = new_job.into_job();
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, client_id, status, days, start_date, end_date, config,
                retry_count, max_retries, result_summary, logs,
                started_at, completed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(job.id)
        .bind(job.client_id)
        .bind(job.status)
        .bind(job.days)
        .bind(&job.start_date)
        .bind(&job.end_date)
        .bind(&job.config)
        .bind(job.retry_count)
        .bind(job.max_retries)
        .bind(&job.result_summary)
        .bind(&job.logs)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, DbError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn update(&self, job: &Job) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                retry_count = $3,
                result_summary = $4,
                logs = $5,
                completed_at = $6
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.retry_count)
        .bind(&job.result_summary)
        .bind(&job.logs)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("job {}", job.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectorStore for PgStores {
    async fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Connector>, DbError> {
        let connectors = sqlx::query_as::<_, Connector>(
            "SELECT * FROM connectors WHERE client_id = $1 ORDER BY created_at",
        )
        .bind(client_id.into_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(connectors)
    }
}

#[async_trait]
impl ClientDirectory for PgStores {
    async fn active_users(&self, client_id: ClientId) -> Result<Vec<ClientUser>, DbError> {
        let users = sqlx::query_as::<_, ClientUser>(
            "SELECT * FROM client_users WHERE client_id = $1 AND status = 'active'",
        )
        .bind(client_id.into_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

#[async_trait]
impl WebhookStore for PgStores {
    async fn active_for_client(&self, client_id: ClientId) -> Result<Vec<Webhook>, DbError> {
        let rows = sqlx::query_as::<_, WebhookRow>(
            "SELECT * FROM webhooks WHERE client_id = $1 AND status = 'active'",
        )
        .bind(client_id.into_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Webhook::from).collect())
    }

    async fn find(&self, id: WebhookId) -> Result<Option<Webhook>, DbError> {
        let row = sqlx::query_as::<_, WebhookRow>("SELECT * FROM webhooks WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Webhook::from))
    }

    async fn append_delivery(
        &self,
        delivery: NewWebhookDelivery,
    ) -> Result<WebhookDelivery, DbError> {
        let row = delivery.into_delivery();
        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (
                id, webhook_id, job_id, event, payload, status_code,
                response_body, error_message, success, created_at, delivered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.id)
        .bind(row.webhook_id)
        .bind(row.job_id)
        .bind(&row.event)
        .bind(&row.payload)
        .bind(row.status_code)
        .bind(&row.response_body)
        .bind(&row.error_message)
        .bind(row.success)
        .bind(row.created_at)
        .bind(row.delivered_at)
        .execute(&self.pool)
        .await?;
        Ok(row)
    }

    async fn record_success(&self, id: WebhookId) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE webhooks
            SET failure_count = 0, last_success = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("webhook {id}")));
        }
        Ok(())
    }

    async fn record_failure(&self, id: WebhookId, threshold: i32) -> Result<Webhook, DbError> {
        let row = sqlx::query_as::<_, WebhookRow>(
            r#"
            UPDATE webhooks
            SET failure_count = failure_count + 1,
                last_failure = now(),
                updated_at = now(),
                status = CASE
                    WHEN failure_count + 1 >= $2 THEN 'failed'
                    ELSE status
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.into_uuid())
        .bind(threshold)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("webhook {id}")))?;
        Ok(Webhook::from(row))
    }

    async fn reactivate(&self, id: WebhookId) -> Result<Webhook, DbError> {
        let row = sqlx::query_as::<_, WebhookRow>(
            r#"
            UPDATE webhooks
            SET status = 'active', failure_count = 0, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("webhook {id}")))?;
        Ok(Webhook::from(row))
    }
}
