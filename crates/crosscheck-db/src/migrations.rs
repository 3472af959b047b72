//! Embedded schema migrations.

use sqlx::PgPool;

use crate::error::DbError;

/// Apply all pending migrations.
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(DbError::MigrationFailed)
}
