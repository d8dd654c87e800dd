//! Import of the original storage layout.
//!
//! Before the `outputs` table existed, every output was kept in one JSON
//! array stored under the [`LEGACY_OUTPUTS_KEY`] setting. On startup the
//! array is moved into `outputs` (in array order) and the setting is
//! removed, both in one transaction. Field names of that era are
//! accepted as aliases.

use horde_core::params::GenerationRequest;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::output::CreateOutput;
use crate::repositories::{OutputRepo, SettingsRepo};
use crate::DbPool;

/// Settings key holding the legacy JSON array.
pub const LEGACY_OUTPUTS_KEY: &str = "outputs";

#[derive(Debug, thiserror::Error)]
pub enum LegacyImportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed legacy outputs: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One element of the legacy array.
#[derive(Debug, Deserialize)]
struct LegacyOutput {
    #[serde(alias = "img")]
    image: String,
    #[serde(default)]
    prompt: String,
    #[serde(default, deserialize_with = "lenient_string")]
    seed: String,
    #[serde(default, alias = "modelName")]
    model: Option<String>,
    #[serde(default, alias = "workerID")]
    worker_id: Option<String>,
    #[serde(default, alias = "workerName")]
    worker_name: Option<String>,
    #[serde(default, alias = "jobId")]
    job_id: Option<String>,
    #[serde(default, alias = "stars", deserialize_with = "lenient_bool")]
    starred: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    rated: bool,
    #[serde(default)]
    request: Option<GenerationRequest>,
}

/// Move the legacy array, if any, into the `outputs` table.
///
/// Returns the number of imported outputs. A malformed array is left in
/// place so that no data is lost.
pub async fn import_legacy_outputs(pool: &DbPool) -> Result<usize, LegacyImportError> {
    let Some(raw) = SettingsRepo::get(pool, LEGACY_OUTPUTS_KEY).await? else {
        return Ok(0);
    };

    let legacy: Vec<LegacyOutput> = serde_json::from_str(&raw)?;
    let now = chrono::Utc::now();
    let inputs = legacy
        .into_iter()
        .map(|entry| {
            let request = entry
                .request
                .unwrap_or_else(|| GenerationRequest::new(entry.prompt.clone()));
            Ok(CreateOutput {
                image: entry.image,
                prompt: entry.prompt,
                request: serde_json::to_string(&request)?,
                seed: entry.seed,
                model: entry.model,
                worker_id: entry.worker_id,
                worker_name: entry.worker_name,
                job_id: entry.job_id,
                generation_id: None,
                starred: entry.starred,
                rated: entry.rated,
                censored: false,
                created_at: now,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    let mut tx = pool.begin().await?;
    let imported = OutputRepo::insert_all(&mut tx, &inputs).await?.len();
    SettingsRepo::delete(&mut *tx, LEGACY_OUTPUTS_KEY).await?;
    tx.commit().await?;

    tracing::info!(imported, "Imported legacy outputs");
    Ok(imported)
}

/// Seeds were sometimes stored as numbers.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Flags were stored as booleans, `"true"` strings or 0/1.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    })
}
