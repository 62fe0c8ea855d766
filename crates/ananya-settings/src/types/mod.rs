//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production values and is marked `#[serde(default)]`, so
//! partial JSON only needs the fields it overrides.

mod chat;
mod server;

pub use chat::*;
pub use server::*;

use ananya_core::constants::PLATFORM_MESSAGE_LIMIT;
use ananya_core::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Root settings type for the Ananya engine.
///
/// # JSON Format
///
/// ```json
/// {
///   "context": { "maxTurns": 20 },
///   "broadcast": { "sendsPerSecond": 10 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnanyaSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Per-user context window.
    pub context: ContextSettings,
    /// Outbound chunking.
    pub chunking: ChunkingSettings,
    /// Inbound payload limits.
    pub input: InputSettings,
    /// Language model backend.
    pub model: ModelSettings,
    /// Speech-to-text backend.
    pub transcription: TranscriptionSettings,
    /// Broadcast dispatch.
    pub broadcast: BroadcastSettings,
    /// Admin HTTP server.
    pub server: ServerSettings,
    /// Telegram Bot API.
    pub telegram: TelegramSettings,
    /// Persistent store.
    pub storage: StorageSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl Default for AnanyaSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "ananya".to_string(),
            context: ContextSettings::default(),
            chunking: ChunkingSettings::default(),
            input: InputSettings::default(),
            model: ModelSettings::default(),
            transcription: TranscriptionSettings::default(),
            broadcast: BroadcastSettings::default(),
            server: ServerSettings::default(),
            telegram: TelegramSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AnanyaSettings {
    /// Clamp out-of-range values and correct invalid invariants.
    ///
    /// Called automatically during loading. Bad values are corrected with a
    /// warning instead of failing startup.
    pub fn validate(&mut self) {
        fn clamp_min<T: PartialOrd + Copy + std::fmt::Display>(val: &mut T, min: T, name: &str) {
            if *val < min {
                tracing::warn!("{name} below minimum ({val}), raised to {min}");
                *val = min;
            }
        }

        let b = &mut self.broadcast;
        if !(0.0..=1.0).contains(&b.jitter_factor) {
            let clamped = b.jitter_factor.clamp(0.0, 1.0);
            tracing::warn!("jitter_factor out of range ({}), clamped to {clamped}", b.jitter_factor);
            b.jitter_factor = clamped;
        }
        clamp_min(&mut b.workers, 1, "broadcast.workers");
        clamp_min(&mut b.sends_per_second, 1, "broadcast.sends_per_second");
        clamp_min(&mut b.send_timeout_ms, 100, "broadcast.send_timeout_ms");
        clamp_min(&mut b.max_active_jobs, 1, "broadcast.max_active_jobs");
        if b.max_delay_ms < b.base_delay_ms {
            tracing::warn!(
                "broadcast max_delay_ms ({}) < base_delay_ms ({}), correcting",
                b.max_delay_ms,
                b.base_delay_ms
            );
            b.max_delay_ms = b.base_delay_ms;
        }

        clamp_min(&mut self.context.max_turns, 1, "context.max_turns");
        clamp_min(&mut self.context.max_users, 1, "context.max_users");

        clamp_min(&mut self.chunking.limit, 1, "chunking.limit");
        if self.chunking.limit > PLATFORM_MESSAGE_LIMIT {
            tracing::warn!(
                "chunking.limit ({}) above platform limit, clamped to {PLATFORM_MESSAGE_LIMIT}",
                self.chunking.limit
            );
            self.chunking.limit = PLATFORM_MESSAGE_LIMIT;
        }

        clamp_min(&mut self.model.timeout_ms, 1000, "model.timeout_ms");
        clamp_min(&mut self.transcription.timeout_ms, 1000, "transcription.timeout_ms");
    }
}

/// Broadcast dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastSettings {
    /// Retries per recipient after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor (0.0–1.0) applied to backoff delays.
    pub jitter_factor: f64,
    /// Global ceiling on sends per second across all workers.
    pub sends_per_second: u32,
    /// Concurrent send workers per job.
    pub workers: usize,
    /// Per-send timeout in milliseconds.
    pub send_timeout_ms: u64,
    /// Jobs allowed to run at once.
    pub max_active_jobs: usize,
    /// Maximum broadcast message length in characters.
    pub max_message_chars: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            jitter_factor: 0.2,
            sends_per_second: 25,
            workers: 8,
            send_timeout_ms: 10_000,
            max_active_jobs: 2,
            max_message_chars: PLATFORM_MESSAGE_LIMIT,
        }
    }
}

impl BroadcastSettings {
    /// Retry parameters for per-recipient sends.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            jitter_factor: self.jitter_factor,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_version() {
        let s = AnanyaSettings::default();
        assert_eq!(s.version, "0.1.0");
        assert_eq!(s.name, "ananya");
    }

    #[test]
    fn default_settings_serde_roundtrip() {
        let defaults = AnanyaSettings::default();
        let json = serde_json::to_string(&defaults).unwrap();
        let back: AnanyaSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server.port, defaults.server.port);
        assert_eq!(back.context.max_turns, defaults.context.max_turns);
        assert_eq!(back.broadcast.workers, defaults.broadcast.workers);
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(AnanyaSettings::default()).unwrap();
        assert!(json["context"].get("maxTurns").is_some());
        assert!(json["broadcast"].get("sendsPerSecond").is_some());
        assert!(json["model"].get("maxOutputTokens").is_some());
        assert!(json["telegram"].get("pollTimeoutSecs").is_some());
    }

    #[test]
    fn secrets_are_not_serialized_when_unset() {
        let json = serde_json::to_value(AnanyaSettings::default()).unwrap();
        assert!(json["server"].get("adminToken").is_none());
        assert!(json["telegram"].get("botToken").is_none());
        assert!(json["model"].get("apiKey").is_none());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: AnanyaSettings = serde_json::from_str(r#"{"broadcast": {"workers": 3}}"#).unwrap();
        assert_eq!(s.broadcast.workers, 3);
        assert_eq!(s.broadcast.max_retries, 2);
        assert_eq!(s.chunking.limit, 4000);
    }

    #[test]
    fn validate_clamps_out_of_range_values() {
        let mut s = AnanyaSettings::default();
        s.broadcast.jitter_factor = 3.0;
        s.broadcast.workers = 0;
        s.broadcast.sends_per_second = 0;
        s.broadcast.max_delay_ms = 10;
        s.chunking.limit = 9000;
        s.context.max_turns = 0;
        s.validate();
        assert!((s.broadcast.jitter_factor - 1.0).abs() < f64::EPSILON);
        assert_eq!(s.broadcast.workers, 1);
        assert_eq!(s.broadcast.sends_per_second, 1);
        assert_eq!(s.broadcast.max_delay_ms, s.broadcast.base_delay_ms);
        assert_eq!(s.chunking.limit, 4000);
        assert_eq!(s.context.max_turns, 1);
    }

    #[test]
    fn validate_keeps_valid_values() {
        let mut s = AnanyaSettings::default();
        s.chunking.limit = 1000;
        s.validate();
        assert_eq!(s.chunking.limit, 1000);
        assert_eq!(s.broadcast.workers, 8);
    }

    #[test]
    fn retry_config_mirrors_broadcast_settings() {
        let s = BroadcastSettings::default();
        let retry = s.retry_config();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.base_delay_ms, 500);
    }
}
