//! Positional output registry.
//!
//! [`OutputRegistry`] owns the ordered list of generated artifacts. Ids are
//! positional: after every insert or delete they are renumbered so that
//! `record.id == position + 1`. An id is therefore not a stable identity;
//! any id held across a delete may point at a different record afterwards.
//! The durable identity is [`OutputRecord::storage_key`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::params::GenerationRequest;
use crate::types::{DbId, OutputId, Timestamp};

/// A persisted, user-visible generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Positional id, `1..=len`.
    pub id: OutputId,
    /// Row id in the local database, if the record has been persisted.
    #[serde(skip)]
    pub storage_key: Option<DbId>,
    /// Base64-encoded image payload.
    pub image: String,
    /// Positive prompt of the submission that produced the image.
    pub prompt: String,
    /// The submission snapshot, taken when the request was sent.
    pub request: GenerationRequest,
    pub seed: String,
    pub model: Option<String>,
    pub worker_id: Option<String>,
    pub worker_name: Option<String>,
    /// Horde job id the image belongs to.
    pub job_id: Option<String>,
    /// Horde generation id, used for rating.
    pub generation_id: Option<String>,
    pub starred: bool,
    pub rated: bool,
    pub censored: bool,
    pub created_at: Timestamp,
}

/// Ordering for [`OutputRegistry::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortCriterion {
    /// Ascending positional id.
    #[default]
    Id,
    /// Starred records first, then ascending id.
    Starred,
}

impl FromStr for SortCriterion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "starred" | "stars" => Ok(Self::Starred),
            other => Err(CoreError::Validation(format!(
                "Invalid sort criterion '{other}'. Must be one of: id, starred"
            ))),
        }
    }
}

/// In-memory ordered collection of [`OutputRecord`]s.
#[derive(Debug, Default, Clone)]
pub struct OutputRegistry {
    records: Vec<OutputRecord>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from records already in storage order.
    pub fn from_records(records: Vec<OutputRecord>) -> Self {
        let mut registry = Self { records };
        registry.renumber();
        registry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    /// The id the next appended record would get once renumbered.
    ///
    /// Returns `len()`, matching the historical contract. Not stable if the
    /// registry is modified between this call and the append.
    pub fn new_id(&self) -> OutputId {
        self.records.len() as OutputId
    }

    /// Append a record at the end and renumber. Returns the record's id.
    pub fn append(&mut self, record: OutputRecord) -> OutputId {
        self.records.push(record);
        self.renumber();
        self.records.len() as OutputId
    }

    /// Find a record by its current positional id.
    pub fn lookup_by_id(&self, id: OutputId) -> Result<&OutputRecord, CoreError> {
        self.position_of(id).map(|idx| &self.records[idx])
    }

    /// Flip the starred flag. Returns the new value.
    pub fn toggle_star(&mut self, id: OutputId) -> Result<bool, CoreError> {
        let idx = self.position_of(id)?;
        let record = &mut self.records[idx];
        record.starred = !record.starred;
        Ok(record.starred)
    }

    /// Mark a record as rated on the Horde.
    pub fn mark_rated(&mut self, id: OutputId) -> Result<(), CoreError> {
        let idx = self.position_of(id)?;
        self.records[idx].rated = true;
        Ok(())
    }

    /// Remove one record and renumber. Returns the removed record.
    pub fn delete(&mut self, id: OutputId) -> Result<OutputRecord, CoreError> {
        let idx = self.position_of(id)?;
        let removed = self.records.remove(idx);
        self.renumber();
        Ok(removed)
    }

    /// Remove every record whose current id is in `ids`, then renumber once.
    ///
    /// Ids are resolved against the numbering *before* the call. Unknown
    /// ids are ignored. Returns the removed records in storage order.
    pub fn delete_many(&mut self, ids: &[OutputId]) -> Vec<OutputRecord> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| ids.contains(&record.id));
        self.records = kept;
        self.renumber();
        removed
    }

    /// Return a sorted copy of `data`; the input is left untouched.
    pub fn sort_by(criterion: SortCriterion, data: &[OutputRecord]) -> Vec<OutputRecord> {
        let mut sorted = data.to_vec();
        match criterion {
            SortCriterion::Id => sorted.sort_by_key(|r| r.id),
            SortCriterion::Starred => sorted.sort_by_key(|r| (!r.starred, r.id)),
        }
        sorted
    }

    /// One page (1-based) of the registry after sorting.
    pub fn page(&self, criterion: SortCriterion, page: usize, page_size: usize) -> Vec<OutputRecord> {
        let Some(skip) = page.checked_sub(1).and_then(|p| p.checked_mul(page_size)) else {
            return Vec::new();
        };
        if page_size == 0 {
            return Vec::new();
        }
        Self::sort_by(criterion, &self.records)
            .into_iter()
            .skip(skip)
            .take(page_size)
            .collect()
    }

    /// Number of pages for the given page size.
    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.records.len().div_ceil(page_size)
    }

    // ---- private helpers ----

    fn position_of(&self, id: OutputId) -> Result<usize, CoreError> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or(CoreError::NotFound {
                entity: "Output",
                id,
            })
    }

    fn renumber(&mut self) {
        for (idx, record) in self.records.iter_mut().enumerate() {
            record.id = idx as OutputId + 1;
        }
    }
}
