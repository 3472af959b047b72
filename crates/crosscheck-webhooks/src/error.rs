//! Error types for the webhook channel.

use thiserror::Error;

use crosscheck_core::WebhookId;
use crosscheck_db::DbError;

/// Errors surfaced by the webhook dispatcher.
///
/// Delivery failures themselves are not errors — they are recorded on the
/// delivery log and the webhook's failure counter. These variants cover the
/// dispatcher's own plumbing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The referenced webhook does not exist.
    #[error("webhook not found: {0}")]
    NotFound(WebhookId),

    /// The store rejected a read or write.
    #[error("webhook storage error: {0}")]
    Storage(#[from] DbError),

    /// The payload could not be serialized.
    #[error("failed to serialize webhook payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The shared HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
