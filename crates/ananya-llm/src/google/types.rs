//! Gemini API request/response types and provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Google provider configuration.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    /// Model ID.
    pub model: String,
    /// API key sent as `x-goog-api-key`.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Sampling parameters.
    pub generation: GenerationConfig,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GoogleConfig {
    /// Configuration with default model, endpoint, and sampling parameters.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            generation: GenerationConfig::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Maximum tokens generated.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 4096,
        }
    }
}

/// Inline binary payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type.
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

/// One content part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Binary content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    /// Marks model reasoning parts (excluded from replies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// Text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
            thought: None,
        }
    }

    /// Inline data part.
    #[must_use]
    pub fn inline(mime_type: impl Into<String>, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data,
            }),
            thought: None,
        }
    }
}

/// A role-tagged list of parts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// `"user"` or `"model"`; absent for system instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// `generateContent` request body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// System prompt.
    pub system_instruction: Content,
    /// Conversation, oldest first, ending with the current user message.
    pub contents: Vec<Content>,
    /// Sampling parameters.
    pub generation_config: GenerationConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// `generateContent` response body.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate replies.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Prompt-level feedback (set when the prompt itself was blocked).
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// One candidate reply.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Reply content.
    #[serde(default)]
    pub content: Option<Content>,
    /// Finish reason string.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Prompt-level feedback.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Reason the prompt was blocked.
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    /// Error body.
    pub error: ApiErrorBody,
}

/// Error body.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Status string such as `RESOURCE_EXHAUSTED`.
    #[serde(default)]
    pub status: Option<String>,
}
