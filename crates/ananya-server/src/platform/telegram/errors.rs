//! Bot API failures.

use std::time::Duration;

use thiserror::Error;

/// Failure talking to the Bot API.
///
/// Messages never contain the bot token: transport errors are stripped of
/// their URL before they are stored.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// No bot token configured.
    #[error("telegram bot token is not configured")]
    MissingToken,

    /// The request did not complete in time.
    #[error("telegram request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("telegram request failed: {0}")]
    Network(String),

    /// The Bot API answered `ok: false`.
    #[error("telegram API error {status}: {description}")]
    Api {
        /// HTTP status (or `error_code` from the body).
        status: u16,
        /// Error text from the body.
        description: String,
        /// Flood-control delay.
        retry_after: Option<Duration>,
    },

    /// The response body was not what the Bot API documents.
    #[error("unexpected telegram response: {0}")]
    Decode(String),

    /// `getFile` returned no download path.
    #[error("file {file_id} has no download path")]
    MissingFilePath {
        /// Requested file.
        file_id: String,
    },
}

impl TelegramError {
    /// Transport failure with the request URL removed.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.without_url().to_string())
        } else {
            Self::Network(err.without_url().to_string())
        }
    }

    /// HTTP status for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
