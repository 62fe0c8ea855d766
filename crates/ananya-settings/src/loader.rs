//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AnanyaSettings::default()`]
//! 2. If `settings.json` exists, deep-merge user values over defaults
//! 3. Apply `ANANYA_*` environment variable overrides (highest priority)
//! 4. [`AnanyaSettings::validate`] clamps anything out of range
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::AnanyaSettings;

/// Directory holding `settings.json` and the default database.
///
/// `$ANANYA_HOME` when set, otherwise `~/.ananya`.
pub fn settings_dir() -> PathBuf {
    if let Some(home) = std::env::var("ANANYA_HOME").ok().filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ananya")
}

/// Resolve the path to the settings file.
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AnanyaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<AnanyaSettings> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Load settings resolving env overrides through `lookup`.
pub fn load_with_env(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<AnanyaSettings> {
    let defaults = serde_json::to_value(AnanyaSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: AnanyaSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, lookup);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value wins).
pub fn apply_env_overrides(settings: &mut AnanyaSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Secrets ─────────────────────────────────────────────────────
    if let Some(v) = read("ANANYA_TELEGRAM_BOT_TOKEN") {
        settings.telegram.bot_token = Some(v);
    }
    if let Some(v) = read("ANANYA_GEMINI_API_KEY") {
        settings.model.api_key = Some(v);
    }
    if let Some(v) = read("ANANYA_ADMIN_TOKEN") {
        settings.server.admin_token = Some(v);
    }

    // ── Server / storage ────────────────────────────────────────────
    if let Some(v) = read("ANANYA_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => tracing::warn!(key = "ANANYA_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("ANANYA_DB_PATH") {
        settings.storage.db_path = Some(v);
    }
    if let Some(v) = read("ANANYA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("ANANYA_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => tracing::warn!(key = "ANANYA_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }

    // ── Backends ────────────────────────────────────────────────────
    if let Some(v) = read("ANANYA_MODEL") {
        settings.model.model = v;
    }
    if let Some(v) = read("ANANYA_TRANSCRIPTION_URL") {
        settings.transcription.base_url = v;
        settings.transcription.enabled = true;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
