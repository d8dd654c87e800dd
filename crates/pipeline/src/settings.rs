//! User settings persisted in the `settings_kv` table.

use horde_core::error::CoreError;
use horde_core::leaderboard::LeaderboardKey;
use horde_core::media::DownloadFormat;
use horde_db::repositories::SettingsRepo;
use horde_db::DbPool;
use serde::Serialize;

pub const KEY_API_KEY: &str = "api_key";
pub const KEY_PAGE_SIZE: &str = "page_size";
pub const KEY_EMBED_METADATA: &str = "embed_metadata";
pub const KEY_DOWNLOAD_FORMAT: &str = "download_format";
pub const KEY_LEADERBOARD_KEY: &str = "leaderboard_key";

/// All recognised setting keys.
pub const SETTING_KEYS: &[&str] = &[
    KEY_API_KEY,
    KEY_PAGE_SIZE,
    KEY_EMBED_METADATA,
    KEY_DOWNLOAD_FORMAT,
    KEY_LEADERBOARD_KEY,
];

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSettings {
    /// `None` means anonymous.
    pub api_key: Option<String>,
    pub page_size: usize,
    pub embed_metadata: bool,
    pub download_format: DownloadFormat,
    pub leaderboard_key: LeaderboardKey,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            embed_metadata: false,
            download_format: DownloadFormat::Webp,
            leaderboard_key: LeaderboardKey::Kudos,
        }
    }
}

impl AppSettings {
    /// Load settings, falling back to defaults for missing or invalid values.
    pub async fn load(pool: &DbPool) -> Result<Self, sqlx::Error> {
        let mut settings = Self::default();
        for setting in SettingsRepo::list(pool).await? {
            if !SETTING_KEYS.contains(&setting.key.as_str()) {
                continue;
            }
            if let Err(e) = settings.set(&setting.key, &setting.value) {
                tracing::warn!(key = %setting.key, error = %e, "Ignoring invalid stored setting");
            }
        }
        Ok(settings)
    }

    /// Write every setting.
    pub async fn save(&self, pool: &DbPool) -> Result<(), sqlx::Error> {
        for key in SETTING_KEYS {
            match self.get(key) {
                Some(value) => SettingsRepo::set(pool, key, &value).await?,
                None => {
                    SettingsRepo::delete(pool, key).await?;
                }
            }
        }
        Ok(())
    }

    /// Parse and apply one setting from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let value = value.trim();
        match key {
            KEY_API_KEY => {
                self.api_key = (!value.is_empty()).then(|| value.to_string());
            }
            KEY_PAGE_SIZE => {
                let size: usize = value.parse().map_err(|_| {
                    CoreError::Validation(format!("Invalid page size '{value}'"))
                })?;
                if size == 0 || size > MAX_PAGE_SIZE {
                    return Err(CoreError::Validation(format!(
                        "Page size must be between 1 and {MAX_PAGE_SIZE}"
                    )));
                }
                self.page_size = size;
            }
            KEY_EMBED_METADATA => {
                self.embed_metadata = match value.to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    other => {
                        return Err(CoreError::Validation(format!(
                            "Invalid boolean '{other}'"
                        )))
                    }
                };
            }
            KEY_DOWNLOAD_FORMAT => self.download_format = value.parse()?,
            KEY_LEADERBOARD_KEY => self.leaderboard_key = value.parse()?,
            other => {
                return Err(CoreError::Validation(format!(
                    "Unknown setting '{other}'. Must be one of: {}",
                    SETTING_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// String form of one setting, `None` when unset.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            KEY_API_KEY => self.api_key.clone(),
            KEY_PAGE_SIZE => Some(self.page_size.to_string()),
            KEY_EMBED_METADATA => Some(self.embed_metadata.to_string()),
            KEY_DOWNLOAD_FORMAT => Some(
                match self.download_format {
                    DownloadFormat::Webp => "webp",
                    DownloadFormat::Png => "png",
                    DownloadFormat::Jpeg => "jpeg",
                }
                .to_string(),
            ),
            KEY_LEADERBOARD_KEY => Some(
                match self.leaderboard_key {
                    LeaderboardKey::Kudos => "kudos",
                    LeaderboardKey::MegapixelSteps => "megapixelsteps",
                }
                .to_string(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    async fn pool() -> DbPool {
        let pool = horde_db::connect_in_memory().await.unwrap();
        horde_db::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn defaults_when_nothing_stored() {
        let settings = AppSettings::load(&pool().await).await.unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.page_size, 25);
    }

    #[tokio::test]
    async fn save_then_load() {
        let pool = pool().await;
        let mut settings = AppSettings::default();
        settings.set(KEY_API_KEY, "secret").unwrap();
        settings.set(KEY_PAGE_SIZE, "50").unwrap();
        settings.set(KEY_DOWNLOAD_FORMAT, "jpg").unwrap();
        settings.set(KEY_EMBED_METADATA, "yes").unwrap();
        settings.set(KEY_LEADERBOARD_KEY, "mps").unwrap();
        settings.save(&pool).await.unwrap();

        let loaded = AppSettings::load(&pool).await.unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.get(KEY_DOWNLOAD_FORMAT).as_deref(), Some("jpeg"));
    }

    #[tokio::test]
    async fn invalid_stored_value_falls_back_to_default() {
        let pool = pool().await;
        SettingsRepo::set(&pool, KEY_PAGE_SIZE, "lots").await.unwrap();
        let loaded = AppSettings::load(&pool).await.unwrap();
        assert_eq!(loaded.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn rejects_unknown_key_and_bad_page_size() {
        let mut settings = AppSettings::default();
        assert_matches!(settings.set("theme", "dark"), Err(CoreError::Validation(_)));
        assert_matches!(settings.set(KEY_PAGE_SIZE, "0"), Err(CoreError::Validation(_)));
        assert_matches!(settings.set(KEY_PAGE_SIZE, "201"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn clearing_api_key_goes_anonymous() {
        let mut settings = AppSettings::default();
        settings.set(KEY_API_KEY, "abc").unwrap();
        settings.set(KEY_API_KEY, "  ").unwrap();
        assert_eq!(settings.api_key, None);
    }
}
