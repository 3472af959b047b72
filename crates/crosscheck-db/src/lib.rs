//! crosscheck persistence layer
//!
//! Data models for the job/connector/webhook entities, the store traits the
//! orchestrator consumes, and two implementations: Postgres over `sqlx`
//! (runtime queries, no offline checking) and an in-memory variant for tests
//! and local development.
//!
//! Connector configs and webhook secrets are encrypted at rest with
//! AES-256-GCM; see [`crypto`].

pub mod crypto;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStores;
pub use postgres::PgStores;
pub use store::{ClientDirectory, ConnectorStore, JobStore, WebhookStore};
