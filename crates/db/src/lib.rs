//! Local persistence for the Horde client.
//!
//! A single SQLite file holds the `settings_kv` table and the `outputs`
//! table. Schema changes are versioned migrations under `migrations/`;
//! the pre-table (JSON array under a settings key) layout is handled by
//! [`legacy::import_legacy_outputs`].

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod legacy;
pub mod models;
pub mod repositories;

pub type DbPool = sqlx::SqlitePool;

/// Open (creating if missing) the database file at `path`.
pub async fn create_pool(path: &Path) -> Result<DbPool, sqlx::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// A private in-memory database.
///
/// Every SQLite connection to `:memory:` is its own database, so the pool
/// is pinned to one long-lived connection.
pub async fn connect_in_memory() -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
}

/// Verify the pool can run a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
