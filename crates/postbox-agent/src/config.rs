//! Agent configuration loaded from environment variables.
//!
//! Every setting has a default, so the agent starts against the production
//! API with no configuration beyond a channel id.

use std::path::PathBuf;
use std::time::Duration;

use postbox_sync::SyncConfig;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Sync engine settings.
    /// Env: `POSTBOX_API_URL`, `POSTBOX_APP_KEY`, `POSTBOX_APP_SECRET`,
    /// `POSTBOX_REQUEST_TIMEOUT_SECS`, `POSTBOX_MAX_RETRIES`
    pub sync: SyncConfig,

    /// Push channel this installation is registered under.
    /// Env: `POSTBOX_CHANNEL_ID`
    /// Default: none (user creation waits until one is configured).
    pub channel_id: Option<String>,

    /// Explicit database file.
    /// Env: `POSTBOX_DB_PATH`
    /// Default: the platform data directory.
    pub db_path: Option<PathBuf>,

    /// How often the user and message refresh jobs are queued.
    /// Env: `POSTBOX_REFRESH_INTERVAL_SECS`
    /// Default: 15 minutes.
    pub refresh_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            channel_id: None,
            db_path: None,
            refresh_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = var("POSTBOX_API_URL") {
            config.sync.api_url = url.trim_end_matches('/').to_string();
        }

        config.sync.app_key = var("POSTBOX_APP_KEY").filter(|v| !v.is_empty());
        config.sync.app_secret = var("POSTBOX_APP_SECRET").filter(|v| !v.is_empty());

        if let Some(val) = var("POSTBOX_REQUEST_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.sync.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid POSTBOX_REQUEST_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = var("POSTBOX_MAX_RETRIES") {
            match val.parse::<u32>() {
                Ok(n) => config.sync.retry.max_retries = n,
                Err(_) => tracing::warn!(value = %val, "Invalid POSTBOX_MAX_RETRIES, using default"),
            }
        }

        if let Some(id) = var("POSTBOX_CHANNEL_ID") {
            let id = id.trim();
            if !id.is_empty() {
                config.channel_id = Some(id.to_string());
            }
        }

        if let Some(path) = var("POSTBOX_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = var("POSTBOX_REFRESH_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.refresh_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid POSTBOX_REFRESH_INTERVAL_SECS, using default"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AgentConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);
        assert_eq!(config.refresh_interval, Duration::from_secs(900));
        assert!(config.channel_id.is_none());
        assert!(config.db_path.is_none());
        assert_eq!(config.sync.retry.max_retries, 5);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("POSTBOX_API_URL", "http://localhost:8080/"),
            ("POSTBOX_CHANNEL_ID", " chan-9 "),
            ("POSTBOX_DB_PATH", "/tmp/inbox.db"),
            ("POSTBOX_REQUEST_TIMEOUT_SECS", "5"),
            ("POSTBOX_REFRESH_INTERVAL_SECS", "60"),
            ("POSTBOX_MAX_RETRIES", "2"),
            ("POSTBOX_APP_KEY", "key"),
            ("POSTBOX_APP_SECRET", "secret"),
        ]);
        assert_eq!(config.sync.api_url, "http://localhost:8080");
        assert_eq!(config.channel_id.as_deref(), Some("chan-9"));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/inbox.db")));
        assert_eq!(config.sync.request_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.sync.retry.max_retries, 2);
        assert_eq!(config.sync.app_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("POSTBOX_REQUEST_TIMEOUT_SECS", "soon"),
            ("POSTBOX_REFRESH_INTERVAL_SECS", "0"),
            ("POSTBOX_MAX_RETRIES", "-1"),
            ("POSTBOX_CHANNEL_ID", "   "),
        ]);
        assert_eq!(config.sync.request_timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_interval, Duration::from_secs(900));
        assert_eq!(config.sync.retry.max_retries, 5);
        assert!(config.channel_id.is_none());
    }
}
