//! # Language Model Trait
//!
//! Core abstraction for model backends. The runtime hands a backend the
//! resolved system prompt, the user's context window, and the current
//! normalized request, and receives the reply text.

use ananya_core::media::NormalizedRequest;
use ananya_core::messages::Turn;
use async_trait::async_trait;

use crate::stop_reason::FinishReason;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Coarse classification of a provider failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Quota or rate limit exhausted.
    Quota,
    /// The call did not finish in time.
    Timeout,
    /// The backend refused to answer on policy grounds.
    ContentPolicy,
    /// Network or 5xx-class failure; a later retry may succeed.
    Transient,
    /// Bad credentials, malformed request, or unusable response.
    Permanent,
}

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication failed (missing or invalid key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited or out of quota.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Request exceeded its deadline.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Prompt or reply blocked by a content filter.
    #[error("Blocked by content policy: {reason}")]
    ContentPolicy {
        /// Block reason reported by the backend.
        reason: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The backend answered without any text.
    #[error("Empty response from model")]
    EmptyResponse,
}

impl ProviderError {
    /// Classify the failure.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Http(e) if e.is_timeout() => ProviderErrorKind::Timeout,
            Self::Http(e) => {
                if e.is_connect() || e.is_request() || e.status().is_some_and(|s| s.is_server_error()) {
                    ProviderErrorKind::Transient
                } else {
                    ProviderErrorKind::Permanent
                }
            }
            Self::RateLimited { .. } => ProviderErrorKind::Quota,
            Self::Timeout { .. } => ProviderErrorKind::Timeout,
            Self::ContentPolicy { .. } => ProviderErrorKind::ContentPolicy,
            Self::Api { retryable: true, .. } | Self::EmptyResponse => ProviderErrorKind::Transient,
            Self::Api { retryable: false, .. } | Self::Auth { .. } | Self::Json(_) => ProviderErrorKind::Permanent,
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ProviderErrorKind::Quota | ProviderErrorKind::Timeout | ProviderErrorKind::Transient
        )
    }

    /// Extract retry-after delay in milliseconds, if available.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Error category string for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self.kind() {
            ProviderErrorKind::Quota => "quota",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::ContentPolicy => "content_policy",
            ProviderErrorKind::Transient => "transient",
            ProviderErrorKind::Permanent => "permanent",
        }
    }
}

/// A model reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Reply text.
    pub text: String,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

impl Completion {
    /// Completed reply.
    #[must_use]
    pub fn end_turn(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: FinishReason::EndTurn,
        }
    }
}

/// Model backend.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider identifier (e.g. `"google"`).
    fn provider_name(&self) -> &'static str;

    /// Model identifier.
    fn model(&self) -> &str;

    /// Produce a reply to `request` given the prior turns in `history`.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        request: &NormalizedRequest,
    ) -> ProviderResult<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_quota() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 2000,
            message: "quota".into(),
        };
        assert_eq!(err.kind(), ProviderErrorKind::Quota);
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), Some(2000));
    }

    #[test]
    fn content_policy_is_not_retryable() {
        let err = ProviderError::ContentPolicy { reason: "SAFETY".into() };
        assert_eq!(err.category(), "content_policy");
        assert!(!err.is_retryable());
    }

    #[test]
    fn api_retryable_flag_drives_kind() {
        let transient = ProviderError::Api {
            status: 503,
            message: "overloaded".into(),
            retryable: true,
        };
        let permanent = ProviderError::Api {
            status: 400,
            message: "bad".into(),
            retryable: false,
        };
        assert_eq!(transient.kind(), ProviderErrorKind::Transient);
        assert_eq!(permanent.kind(), ProviderErrorKind::Permanent);
    }

    #[test]
    fn auth_is_permanent() {
        let err = ProviderError::Auth { message: "no key".into() };
        assert_eq!(err.kind(), ProviderErrorKind::Permanent);
        assert!(err.retry_after_ms().is_none());
    }
}
