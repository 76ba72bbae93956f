//! Sync engine configuration.
//!
//! All settings have sensible defaults; the agent binary overrides them from
//! environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use postbox_shared::constants::USER_UPDATE_INTERVAL_MS;

use crate::retry::RetryConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the message center API, without trailing slash.
    pub api_url: String,

    /// App key and secret used to authenticate user creation.
    /// Both must be set for the credentials to be sent.
    pub app_key: Option<String>,
    pub app_secret: Option<String>,

    /// Per-request transport timeout.
    pub request_timeout: Duration,

    /// Minimum spacing between non-forced user updates, in milliseconds.
    pub user_update_interval_ms: i64,

    /// Backoff applied by the dispatcher to failed jobs.
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "https://device-api.urbanairship.com".to_string(),
            app_key: None,
            app_secret: None,
            request_timeout: Duration::from_secs(30),
            user_update_interval_ms: USER_UPDATE_INTERVAL_MS,
            retry: RetryConfig::default(),
        }
    }
}
