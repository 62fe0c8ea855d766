//! Error hierarchy for the Ananya engine.
//!
//! [`AnanyaError`] covers every failure a turn or a broadcast can surface.
//! Only [`AnanyaError::Misconfiguration`] is fatal; every other kind is
//! local to the turn or recipient that produced it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::UserId;

/// External dependency that produced a transient failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Language model backend.
    Model,
    /// Speech-to-text backend.
    Transcription,
    /// Chat platform transport.
    Transport,
    /// Persistent user store.
    Store,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Transcription => "transcription",
            Self::Transport => "transport",
            Self::Store => "store",
        })
    }
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum AnanyaError {
    /// Input rejected before reaching a backend.
    #[error("validation failed: {message}")]
    Validation {
        /// Human-readable reason.
        message: String,
    },

    /// Timeout, rate limit, or 5xx-class failure of a backend.
    #[error("{backend} unavailable: {message}")]
    TransientBackend {
        /// Which backend failed.
        backend: Backend,
        /// Failure detail.
        message: String,
    },

    /// The recipient can never be reached (blocked, deleted, invalid).
    #[error("recipient {user_id} unreachable: {reason}")]
    PermanentRecipient {
        /// Recipient.
        user_id: UserId,
        /// Failure detail.
        reason: String,
    },

    /// Personality catalog could not be read.
    #[error("personality catalog unavailable: {message}")]
    CatalogUnavailable {
        /// Failure detail.
        message: String,
    },

    /// Admission refused because a resource limit was reached.
    #[error("capacity reached for {resource} (limit {limit})")]
    Capacity {
        /// Name of the exhausted resource.
        resource: &'static str,
        /// Configured limit.
        limit: usize,
    },

    /// Persistent store failure local to one operation.
    #[error("store error: {message}")]
    Store {
        /// Failure detail.
        message: String,
    },

    /// Startup configuration is unusable.
    #[error("misconfiguration: {message}")]
    Misconfiguration {
        /// Failure detail.
        message: String,
    },
}

impl AnanyaError {
    /// Validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Transient backend error.
    #[must_use]
    pub fn transient(backend: Backend, message: impl Into<String>) -> Self {
        Self::TransientBackend {
            backend,
            message: message.into(),
        }
    }

    /// Store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store { message: message.into() }
    }

    /// Catalog-unavailable error.
    #[must_use]
    pub fn catalog_unavailable(message: impl Into<String>) -> Self {
        Self::CatalogUnavailable { message: message.into() }
    }

    /// Misconfiguration error.
    #[must_use]
    pub fn misconfiguration(message: impl Into<String>) -> Self {
        Self::Misconfiguration { message: message.into() }
    }

    /// Whether the operation may succeed if retried later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientBackend { .. } | Self::Capacity { .. } | Self::CatalogUnavailable { .. } | Self::Store { .. }
        )
    }

    /// Whether the process cannot continue.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Misconfiguration { .. })
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::TransientBackend { .. } => "BACKEND_UNAVAILABLE",
            Self::PermanentRecipient { .. } => "RECIPIENT_UNREACHABLE",
            Self::CatalogUnavailable { .. } => "CATALOG_UNAVAILABLE",
            Self::Capacity { .. } => "CAPACITY",
            Self::Store { .. } => "STORE",
            Self::Misconfiguration { .. } => "MISCONFIGURATION",
        }
    }

    /// Message safe to show the end user whose turn failed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => format!("Sorry, I can't process that: {message}"),
            Self::TransientBackend { backend: Backend::Model, .. } => {
                "I'm having trouble thinking right now. Please try again in a moment.".into()
            }
            Self::Capacity { .. } => "I'm a bit overwhelmed right now. Please try again shortly.".into(),
            _ => "Sorry, something went wrong. Please try again.".into(),
        }
    }
}

/// Convenience alias.
pub type Result<T, E = AnanyaError> = std::result::Result<T, E>;
