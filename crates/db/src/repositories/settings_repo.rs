//! Repository for the `settings_kv` table.

use sqlx::SqlitePool;

use crate::models::setting::Setting;

/// Provides get/set access to string-valued settings.
pub struct SettingsRepo;

impl SettingsRepo {
    /// Read a setting value.
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Insert or overwrite a setting.
    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO settings_kv (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(&updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete a setting. Returns `true` if a row was removed.
    ///
    /// Takes any executor so it can join a caller's transaction.
    pub async fn delete<'e, E>(executor: E, key: &str) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM settings_kv WHERE key = ?")
            .bind(key)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All settings, ordered by key.
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Setting>, sqlx::Error> {
        sqlx::query_as::<_, Setting>("SELECT key, value, updated_at FROM settings_kv ORDER BY key")
            .fetch_all(pool)
            .await
    }
}
