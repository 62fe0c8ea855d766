//! Transcriber trait.

use async_trait::async_trait;

use crate::types::{TranscriptionError, TranscriptionResult};

/// Converts audio into text.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` encoded as `mime_type`.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<TranscriptionResult, TranscriptionError>;

    /// Whether the backend is ready to accept requests.
    fn is_ready(&self) -> bool {
        true
    }
}
