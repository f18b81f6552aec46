//! PostgreSQL persistence for muninn archives.
//!
//! Table names are derived per archive from its prefix, so every
//! repository method takes the [`Archive`] it operates on alongside a
//! connection. Writes are expected to run inside a transaction owned by
//! the caller.

use muninn_core::ddl::archive_ddl;
use muninn_core::registry::Archive;
use sqlx::postgres::PgPoolOptions;

pub mod codec;
pub mod models;
pub mod repositories;
pub mod sql;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Create the tables of `archive` when they do not exist yet.
pub async fn ensure_archive_schema(pool: &DbPool, archive: &Archive) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in archive_ddl(archive.config()) {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(archive = %archive.name(), "Archive schema ensured");
    Ok(())
}
