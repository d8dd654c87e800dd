use serde::Serialize;
use sqlx::FromRow;

/// A row from the `settings_kv` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
