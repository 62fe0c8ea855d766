//! Conversation-side settings: context, chunking, input, model, transcription.

use ananya_core::constants::{DEFAULT_CONTEXT_TURNS, PLATFORM_MESSAGE_LIMIT};
use serde::{Deserialize, Serialize};

/// Per-user context window settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Turns retained per user (oldest evicted first).
    pub max_turns: usize,
    /// Maximum number of user contexts held in memory.
    pub max_users: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_CONTEXT_TURNS,
            max_users: 100_000,
        }
    }
}

/// Outbound chunking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkingSettings {
    /// Characters per outbound message. Never above the platform limit.
    pub limit: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            limit: PLATFORM_MESSAGE_LIMIT,
        }
    }
}

/// Inbound payload limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputSettings {
    /// Maximum characters in a text message.
    pub max_text_chars: usize,
    /// Maximum document size in bytes.
    pub max_document_bytes: usize,
    /// Maximum image size in bytes.
    pub max_image_bytes: usize,
    /// Maximum voice note size in bytes.
    pub max_audio_bytes: usize,
    /// Accepted document MIME types.
    pub allowed_document_types: Vec<String>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            max_text_chars: PLATFORM_MESSAGE_LIMIT,
            max_document_bytes: 20 * 1024 * 1024,
            max_image_bytes: 10 * 1024 * 1024,
            max_audio_bytes: 50 * 1024 * 1024,
            allowed_document_types: [
                "application/pdf",
                "text/plain",
                "text/csv",
                "text/markdown",
                "application/json",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Language model backend settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// Provider identifier.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// API base URL.
    pub base_url: String,
    /// API key (usually supplied by env override).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum tokens generated per reply.
    pub max_output_tokens: u32,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

/// Speech-to-text sidecar settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    /// Whether voice notes are transcribed.
    pub enabled: bool,
    /// Sidecar base URL.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout_ms: 30_000,
        }
    }
}
