/// Storage keys are SQLite `INTEGER PRIMARY KEY` row ids.
pub type DbId = i64;

/// User-facing positional output id (always `position + 1`).
pub type OutputId = u32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
