//! Output models and DTOs.

use horde_core::params::GenerationRequest;
use horde_core::registry::OutputRecord;
use horde_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `outputs` table.
///
/// `request` is the JSON form of the cached [`GenerationRequest`].
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutputRow {
    pub id: DbId,
    pub image: String,
    pub prompt: String,
    pub request: String,
    pub seed: String,
    pub model: Option<String>,
    pub worker_id: Option<String>,
    pub worker_name: Option<String>,
    pub job_id: Option<String>,
    pub generation_id: Option<String>,
    pub starred: bool,
    pub rated: bool,
    pub censored: bool,
    pub created_at: Timestamp,
}

impl OutputRow {
    /// Convert to a registry record. The positional id is left at 0 for
    /// the registry to assign.
    pub fn into_record(self) -> Result<OutputRecord, serde_json::Error> {
        let request: GenerationRequest = serde_json::from_str(&self.request)?;
        Ok(OutputRecord {
            id: 0,
            storage_key: Some(self.id),
            image: self.image,
            prompt: self.prompt,
            request,
            seed: self.seed,
            model: self.model,
            worker_id: self.worker_id,
            worker_name: self.worker_name,
            job_id: self.job_id,
            generation_id: self.generation_id,
            starred: self.starred,
            rated: self.rated,
            censored: self.censored,
            created_at: self.created_at,
        })
    }
}

/// DTO for inserting a new output.
#[derive(Debug, Clone)]
pub struct CreateOutput {
    pub image: String,
    pub prompt: String,
    pub request: String,
    pub seed: String,
    pub model: Option<String>,
    pub worker_id: Option<String>,
    pub worker_name: Option<String>,
    pub job_id: Option<String>,
    pub generation_id: Option<String>,
    pub starred: bool,
    pub rated: bool,
    pub censored: bool,
    pub created_at: Timestamp,
}

impl CreateOutput {
    pub fn from_record(record: &OutputRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            image: record.image.clone(),
            prompt: record.prompt.clone(),
            request: serde_json::to_string(&record.request)?,
            seed: record.seed.clone(),
            model: record.model.clone(),
            worker_id: record.worker_id.clone(),
            worker_name: record.worker_name.clone(),
            job_id: record.job_id.clone(),
            generation_id: record.generation_id.clone(),
            starred: record.starred,
            rated: record.rated,
            censored: record.censored,
            created_at: record.created_at,
        })
    }
}
