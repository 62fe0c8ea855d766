//! Core types for transcription.

use serde::Deserialize;

/// Result of transcribing an audio clip.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    /// The transcribed text.
    pub text: String,
    /// Detected language code (e.g. "en").
    #[serde(default)]
    pub language: String,
    /// Duration of the audio in seconds.
    #[serde(default, alias = "duration_seconds")]
    pub duration_seconds: f64,
}

/// Errors that can occur during transcription.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// Backend is disabled or unreachable.
    #[error("transcription unavailable: {0}")]
    Unavailable(String),

    /// Audio exceeds the accepted size.
    #[error("audio too large: {size} bytes (max {max})")]
    AudioTooLarge {
        /// Payload size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Backend rejected or failed the request.
    #[error("backend error: {0}")]
    Backend(String),

    /// Response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request did not finish in time.
    #[error("transcription timed out")]
    Timeout,
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into `TranscriptionError`.
pub trait ResultExt<T> {
    /// Wrap the error as [`TranscriptionError::Backend`] with `context` prefix.
    fn backend(self, context: &str) -> Result<T, TranscriptionError>;
    /// Wrap the error as [`TranscriptionError::Decode`] with `context` prefix.
    fn decode(self, context: &str) -> Result<T, TranscriptionError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn backend(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::Backend(format!("{context}: {e}")))
    }
    fn decode(self, context: &str) -> Result<T, TranscriptionError> {
        self.map_err(|e| TranscriptionError::Decode(format!("{context}: {e}")))
    }
}
