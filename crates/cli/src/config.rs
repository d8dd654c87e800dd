use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "https://aihorde.net/api";
pub const DEFAULT_RATINGS_URL: &str = "https://ratings.aihorde.net/api";
pub const DEFAULT_DATABASE_PATH: &str = "./horde.db";

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for the public Horde.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub ratings_url: String,
    /// Overrides the key stored in settings when set.
    pub api_key: Option<String>,
    pub client_agent: String,
    pub database_path: PathBuf,
    pub generation_poll: Duration,
    pub interrogation_poll: Duration,
    /// Give up on a request after this long. `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                            |
    /// |-------------------------------|------------------------------------|
    /// | `HORDE_API_URL`               | `https://aihorde.net/api`          |
    /// | `HORDE_RATINGS_URL`           | `https://ratings.aihorde.net/api`  |
    /// | `HORDE_API_KEY`               | stored setting, else anonymous     |
    /// | `HORDE_CLIENT_AGENT`          | `horde-cli:<version>:unknown`      |
    /// | `HORDE_DATABASE_PATH`         | `./horde.db`                       |
    /// | `HORDE_GENERATION_POLL_MS`    | `500`                              |
    /// | `HORDE_INTERROGATION_POLL_MS` | `2000`                             |
    /// | `HORDE_MAX_WAIT_SECS`         | unset                              |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let generation_poll_ms: u64 = parse_or(&var, "HORDE_GENERATION_POLL_MS", 500)?;
        let interrogation_poll_ms: u64 = parse_or(&var, "HORDE_INTERROGATION_POLL_MS", 2000)?;
        let max_wait_secs: Option<u64> = var("HORDE_MAX_WAIT_SECS")
            .map(|v| parse("HORDE_MAX_WAIT_SECS", &v))
            .transpose()?;

        if generation_poll_ms == 0 || interrogation_poll_ms == 0 {
            anyhow::bail!("Poll intervals must be greater than zero");
        }

        Ok(Self {
            api_url: var("HORDE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            ratings_url: var("HORDE_RATINGS_URL").unwrap_or_else(|| DEFAULT_RATINGS_URL.into()),
            api_key: var("HORDE_API_KEY"),
            client_agent: var("HORDE_CLIENT_AGENT").unwrap_or_else(|| {
                format!("horde-cli:{}:unknown", env!("CARGO_PKG_VERSION"))
            }),
            database_path: var("HORDE_DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.into())
                .into(),
            generation_poll: Duration::from_millis(generation_poll_ms),
            interrogation_poll: Duration::from_millis(interrogation_poll_ms),
            max_wait: max_wait_secs.map(Duration::from_secs),
        })
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a valid number, got '{value}'"))
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name).map_or(Ok(default), |v| parse(name, &v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.generation_poll, Duration::from_millis(500));
        assert_eq!(config.interrogation_poll, Duration::from_millis(2000));
        assert_eq!(config.max_wait, None);
        assert!(config.client_agent.starts_with("horde-cli:"));
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("HORDE_API_URL", "http://localhost:7001/api"),
            ("HORDE_API_KEY", "abc"),
            ("HORDE_GENERATION_POLL_MS", "250"),
            ("HORDE_MAX_WAIT_SECS", "600"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:7001/api");
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.generation_poll, Duration::from_millis(250));
        assert_eq!(config.max_wait, Some(Duration::from_secs(600)));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config(&[("HORDE_API_KEY", "  ")]).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config(&[("HORDE_GENERATION_POLL_MS", "fast")]).is_err());
        assert!(config(&[("HORDE_INTERROGATION_POLL_MS", "0")]).is_err());
    }
}
