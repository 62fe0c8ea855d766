//! Google provider implementing [`LanguageModel`] via `generateContent`.
//!
//! History turns map to `user`/`model` contents (consecutive same-role turns
//! are merged). Media from the current request is sent as `inlineData`.

use ananya_core::media::{MediaKind, NormalizedRequest};
use ananya_core::messages::{Role, Turn};
use ananya_core::retry::parse_retry_after_header;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, error, instrument, warn};

use super::types::{
    ApiErrorEnvelope, Content, GenerateContentRequest, GenerateContentResponse, GoogleConfig, Part,
};
use crate::provider::{Completion, LanguageModel, ProviderError, ProviderResult};
use crate::stop_reason::{FinishReason, map_google_finish_reason};

/// Google Gemini provider.
pub struct GoogleProvider {
    config: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a provider with its own HTTP client.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Create a provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: GoogleConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| ProviderError::Auth {
                message: format!("Invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    /// Build the request body for one completion.
    pub fn build_request(
        &self,
        system_prompt: &str,
        history: &[Turn],
        request: &NormalizedRequest,
    ) -> GenerateContentRequest {
        let mut contents: Vec<Content> = Vec::with_capacity(history.len() + 1);
        for turn in history {
            if turn.content().is_empty() {
                continue;
            }
            push_merged(&mut contents, api_role(turn.role()), Part::text(turn.content()));
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(media) = &request.media {
            parts.push(Part::inline(media.mime_type.clone(), BASE64.encode(&media.data)));
        }
        let text = if request.text.is_empty() {
            default_instruction(request.kind).to_string()
        } else {
            request.text.clone()
        };
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        for part in parts {
            push_merged(&mut contents, "user", part);
        }

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system_prompt)],
            },
            contents,
            generation_config: self.config.generation.clone(),
        }
    }

    async fn error_from_response(&self, response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after_header);
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        error!(status, model = %self.config.model, "Gemini API error");
        match status {
            429 => ProviderError::RateLimited {
                retry_after_ms: retry_after.unwrap_or(0),
                message,
            },
            401 | 403 => ProviderError::Auth { message },
            408 | 504 => ProviderError::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            },
            s => ProviderError::Api {
                status: s,
                message,
                retryable: s >= 500,
            },
        }
    }
}

/// Text sent alongside media when the user typed nothing.
fn default_instruction(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Text => "",
        MediaKind::Image => "What do you see in this image?",
        MediaKind::Voice => "Listen to this voice message and reply to it.",
        MediaKind::Document => "Please read this document and summarize it.",
    }
}

fn api_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn push_merged(contents: &mut Vec<Content>, role: &str, part: Part) {
    if let Some(last) = contents.last_mut() {
        if last.role.as_deref() == Some(role) {
            last.parts.push(part);
            return;
        }
    }
    contents.push(Content {
        role: Some(role.to_string()),
        parts: vec![part],
    });
}

/// Extract the reply from a parsed response.
pub fn completion_from_response(response: GenerateContentResponse) -> ProviderResult<Completion> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::ContentPolicy { reason });
    }
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ProviderError::EmptyResponse);
    };

    let finish_reason = map_google_finish_reason(candidate.finish_reason.as_deref());
    let text: String = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter(|p| p.thought != Some(true))
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if finish_reason == FinishReason::ContentFilter {
        return Err(ProviderError::ContentPolicy {
            reason: candidate.finish_reason.unwrap_or_default(),
        });
    }
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    if finish_reason == FinishReason::MaxTokens {
        warn!(chars = text.len(), "Gemini reply truncated at max output tokens");
    }
    Ok(Completion { text, finish_reason })
}

#[async_trait]
impl LanguageModel for GoogleProvider {
    fn provider_name(&self) -> &'static str {
        "google"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "google", model = %self.config.model))]
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        request: &NormalizedRequest,
    ) -> ProviderResult<Completion> {
        let body = self.build_request(system_prompt, history, request);
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        debug!(
            history = history.len(),
            kind = %request.kind,
            has_media = request.media.is_some(),
            "sending Gemini request"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    }
                } else {
                    ProviderError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        let parsed: GenerateContentResponse = response.json().await?;
        completion_from_response(parsed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
