//! Persistent output store.
//!
//! [`OutputStore`] wraps the positional [`OutputRegistry`] and writes every
//! mutation through to the `outputs` table before applying it in memory,
//! so a failed write leaves both sides unchanged. On startup the registry
//! is rebuilt from storage order.

use horde_core::error::CoreError;
use horde_core::registry::{OutputRecord, OutputRegistry, SortCriterion};
use horde_core::types::OutputId;
use horde_db::models::output::CreateOutput;
use horde_db::repositories::OutputRepo;
use horde_db::DbPool;
use tokio::sync::RwLock;

use crate::error::SessionError;

pub struct OutputStore {
    registry: RwLock<OutputRegistry>,
    pool: Option<DbPool>,
}

impl OutputStore {
    /// A store with no persistence.
    pub fn in_memory() -> Self {
        Self {
            registry: RwLock::new(OutputRegistry::new()),
            pool: None,
        }
    }

    /// Load every stored output in storage order.
    ///
    /// Rows whose cached request no longer decodes are skipped with a
    /// warning rather than failing the whole load.
    pub async fn load(pool: DbPool) -> Result<Self, SessionError> {
        let rows = OutputRepo::list_all(&pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let storage_key = row.id;
            match row.into_record() {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(storage_key, error = %e, "Skipping undecodable output row");
                }
            }
        }
        tracing::info!(count = records.len(), "Loaded outputs");

        Ok(Self {
            registry: RwLock::new(OutputRegistry::from_records(records)),
            pool: Some(pool),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.pool.is_some()
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.read().await.is_empty()
    }

    /// See [`OutputRegistry::new_id`].
    pub async fn new_id(&self) -> OutputId {
        self.registry.read().await.new_id()
    }

    /// A copy of every record in storage order.
    pub async fn snapshot(&self) -> Vec<OutputRecord> {
        self.registry.read().await.records().to_vec()
    }

    pub async fn get(&self, id: OutputId) -> Result<OutputRecord, SessionError> {
        Ok(self.registry.read().await.lookup_by_id(id)?.clone())
    }

    /// Copies of the records with the given ids, in the order given.
    pub async fn get_many(&self, ids: &[OutputId]) -> Result<Vec<OutputRecord>, SessionError> {
        let registry = self.registry.read().await;
        ids.iter()
            .map(|&id| Ok(registry.lookup_by_id(id)?.clone()))
            .collect()
    }

    pub async fn page(
        &self,
        criterion: SortCriterion,
        page: usize,
        page_size: usize,
    ) -> Vec<OutputRecord> {
        self.registry.read().await.page(criterion, page, page_size)
    }

    pub async fn page_count(&self, page_size: usize) -> usize {
        self.registry.read().await.page_count(page_size)
    }

    /// Persist and append a record. Returns its positional id.
    pub async fn append(&self, mut record: OutputRecord) -> Result<OutputId, SessionError> {
        let mut registry = self.registry.write().await;
        if let Some(pool) = &self.pool {
            let input = CreateOutput::from_record(&record).map_err(internal)?;
            let row = OutputRepo::create(pool, &input).await?;
            record.storage_key = Some(row.id);
        }
        Ok(registry.append(record))
    }

    /// Persist and append several records in one transaction.
    ///
    /// Either every record lands or none does. Returns their ids in order.
    pub async fn append_many(
        &self,
        mut records: Vec<OutputRecord>,
    ) -> Result<Vec<OutputId>, SessionError> {
        let mut registry = self.registry.write().await;
        if let Some(pool) = &self.pool {
            let inputs = records
                .iter()
                .map(CreateOutput::from_record)
                .collect::<Result<Vec<_>, _>>()
                .map_err(internal)?;
            let rows = OutputRepo::create_many(pool, &inputs).await?;
            for (record, row) in records.iter_mut().zip(rows) {
                record.storage_key = Some(row.id);
            }
        }
        Ok(records
            .into_iter()
            .map(|record| registry.append(record))
            .collect())
    }

    /// Flip the starred flag. Returns the new value.
    pub async fn toggle_star(&self, id: OutputId) -> Result<bool, SessionError> {
        let mut registry = self.registry.write().await;
        let record = registry.lookup_by_id(id)?;
        if let (Some(pool), Some(key)) = (&self.pool, record.storage_key) {
            OutputRepo::set_starred(pool, key, !record.starred).await?;
        }
        Ok(registry.toggle_star(id)?)
    }

    pub async fn mark_rated(&self, id: OutputId) -> Result<(), SessionError> {
        let mut registry = self.registry.write().await;
        let record = registry.lookup_by_id(id)?;
        if let (Some(pool), Some(key)) = (&self.pool, record.storage_key) {
            OutputRepo::set_rated(pool, key).await?;
        }
        Ok(registry.mark_rated(id)?)
    }

    /// Delete one record. Later records shift down by one id.
    pub async fn delete(&self, id: OutputId) -> Result<OutputRecord, SessionError> {
        let mut registry = self.registry.write().await;
        let record = registry.lookup_by_id(id)?;
        if let (Some(pool), Some(key)) = (&self.pool, record.storage_key) {
            OutputRepo::delete(pool, key).await?;
        }
        Ok(registry.delete(id)?)
    }

    /// Delete every record in `ids` (resolved before renumbering).
    /// Unknown ids are ignored.
    pub async fn delete_many(&self, ids: &[OutputId]) -> Result<Vec<OutputRecord>, SessionError> {
        let mut registry = self.registry.write().await;
        if let Some(pool) = &self.pool {
            let keys: Vec<_> = registry
                .records()
                .iter()
                .filter(|r| ids.contains(&r.id))
                .filter_map(|r| r.storage_key)
                .collect();
            OutputRepo::delete_many(pool, &keys).await?;
        }
        Ok(registry.delete_many(ids))
    }
}

fn internal(e: serde_json::Error) -> SessionError {
    SessionError::Core(CoreError::Internal(e.to_string()))
}
