//! Process-level settings: admin server, Telegram, storage, logging.

use serde::{Deserialize, Serialize};

/// Admin HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Bearer token required on `/admin` routes. Admin routes are disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            admin_token: None,
        }
    }
}

/// Telegram Bot API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramSettings {
    /// Bot API base URL.
    pub api_base_url: String,
    /// Bot token (usually supplied by env override).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Long-poll timeout for `getUpdates` in seconds.
    pub poll_timeout_secs: u64,
    /// Timeout for every other Bot API request in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.telegram.org".to_string(),
            bot_token: None,
            poll_timeout_secs: 30,
            request_timeout_ms: 15_000,
        }
    }
}

/// Persistent store settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// `SQLite` database path. Defaults to `<settings dir>/ananya.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (`RUST_LOG` wins when set).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
