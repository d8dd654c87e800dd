//! Startup of the local database.

use std::path::Path;

use horde_client::ErrorReporter;
use horde_db::legacy::import_legacy_outputs;
use horde_db::DbPool;

/// An opened database and how it was obtained.
pub struct Storage {
    pub pool: DbPool,
    /// `false` when the file could not be opened and an in-memory
    /// database is standing in for it.
    pub persistent: bool,
    /// Outputs moved over from the legacy settings array.
    pub imported: usize,
}

/// Open the database at `path`, migrate it and import legacy outputs.
///
/// If the file cannot be opened or migrated the failure is reported once
/// and an in-memory database is used instead, so the session keeps
/// working without persistence. Only a failure of that fallback is
/// returned as an error.
pub async fn open_storage(
    path: &Path,
    reporter: &dyn ErrorReporter,
) -> Result<Storage, sqlx::Error> {
    match open_file(path).await {
        Ok(pool) => {
            let imported = match import_legacy_outputs(&pool).await {
                Ok(0) => 0,
                Ok(count) => {
                    tracing::info!(count, "Imported legacy outputs");
                    count
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Legacy output import failed, keeping data in place");
                    0
                }
            };
            Ok(Storage {
                pool,
                persistent: true,
                imported,
            })
        }
        Err(e) => {
            reporter.report(&format!(
                "Local storage unavailable ({}): {e}. Outputs will not be saved.",
                path.display()
            ));
            let pool = horde_db::connect_in_memory().await?;
            migrate(&pool).await?;
            Ok(Storage {
                pool,
                persistent: false,
                imported: 0,
            })
        }
    }
}

async fn open_file(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = horde_db::create_pool(path).await?;
    horde_db::health_check(&pool).await?;
    migrate(&pool).await?;
    tracing::info!(path = %path.display(), "Database ready");
    Ok(pool)
}

async fn migrate(pool: &DbPool) -> Result<(), sqlx::Error> {
    horde_db::run_migrations(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_client::MemoryReporter;

    #[tokio::test]
    async fn opens_file_without_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = MemoryReporter::new();
        let storage = open_storage(&dir.path().join("horde.db"), &reporter)
            .await
            .unwrap();
        assert!(storage.persistent);
        assert_eq!(storage.imported, 0);
        assert!(reporter.messages().is_empty());
    }

    #[tokio::test]
    async fn unusable_path_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();

        let reporter = MemoryReporter::new();
        let storage = open_storage(&path, &reporter).await.unwrap();
        assert!(!storage.persistent);
        assert_eq!(reporter.messages().len(), 1);
        horde_db::health_check(&storage.pool).await.unwrap();
    }
}
