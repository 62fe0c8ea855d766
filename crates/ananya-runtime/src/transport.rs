//! Outbound chat transport.

use std::time::Duration;

use ananya_core::ids::UserId;
use async_trait::async_trait;

/// Failure to deliver one message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The recipient has blocked the bot.
    #[error("recipient blocked the bot")]
    Blocked,

    /// Timeout, rate limit, or server-side failure.
    #[error("transient send failure: {reason}")]
    Transient {
        /// Failure detail.
        reason: String,
        /// Delay requested by the platform before retrying.
        retry_after: Option<Duration>,
    },

    /// The recipient can never be reached (deleted account, invalid chat).
    #[error("permanent send failure: {reason}")]
    Permanent {
        /// Failure detail.
        reason: String,
    },
}

impl SendError {
    /// Transient failure without a platform-requested delay.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    /// Permanent failure.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent { reason: reason.into() }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Chat platform client used for replies and broadcasts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one platform-sized message to `user_id`.
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), SendError>;
}
