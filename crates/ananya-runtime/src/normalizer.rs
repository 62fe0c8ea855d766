//! Input normalization.
//!
//! [`InputNormalizer::validate`] rejects malformed or oversized payloads with
//! a `Validation` error. [`InputNormalizer::normalize`] then builds the
//! canonical request. Voice notes are transcribed; a transcription failure
//! degrades to an empty text with the audio still attached.

use std::sync::Arc;
use std::time::Duration;

use ananya_core::errors::{AnanyaError, Result};
use ananya_core::media::{MediaKind, MediaRef, NormalizedRequest, RawInput};
use ananya_core::text::char_len;
use ananya_settings::InputSettings;
use ananya_transcription::Transcriber;
use metrics::counter;
use tracing::{debug, instrument, warn};

/// Size and type limits for inbound payloads.
#[derive(Clone, Debug)]
pub struct InputLimits {
    /// Maximum characters in a text message or caption.
    pub max_text_chars: usize,
    /// Maximum image bytes.
    pub max_image_bytes: usize,
    /// Maximum voice note bytes.
    pub max_audio_bytes: usize,
    /// Maximum document bytes.
    pub max_document_bytes: usize,
    /// Accepted document MIME types (lowercase, without parameters).
    pub allowed_document_types: Vec<String>,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self::from(&InputSettings::default())
    }
}

impl From<&InputSettings> for InputLimits {
    fn from(settings: &InputSettings) -> Self {
        Self {
            max_text_chars: settings.max_text_chars,
            max_image_bytes: settings.max_image_bytes,
            max_audio_bytes: settings.max_audio_bytes,
            max_document_bytes: settings.max_document_bytes,
            allowed_document_types: settings
                .allowed_document_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
        }
    }
}

/// Builds [`NormalizedRequest`]s from raw platform payloads.
pub struct InputNormalizer {
    limits: InputLimits,
    transcriber: Option<Arc<dyn Transcriber>>,
    transcription_timeout: Duration,
}

impl InputNormalizer {
    /// Normalizer without speech-to-text; voice notes pass through untranscribed.
    pub fn new(limits: InputLimits) -> Self {
        Self {
            limits,
            transcriber: None,
            transcription_timeout: Duration::from_secs(30),
        }
    }

    /// Attach a transcriber bounded by `timeout`.
    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>, timeout: Duration) -> Self {
        self.transcriber = Some(transcriber);
        self.transcription_timeout = timeout;
        self
    }

    /// Active limits.
    pub fn limits(&self) -> &InputLimits {
        &self.limits
    }

    /// Reject payloads that must not reach a backend.
    pub fn validate(&self, raw: &RawInput) -> Result<()> {
        match raw {
            RawInput::Text { text } => {
                if text.trim().is_empty() {
                    return Err(AnanyaError::validation("message is empty"));
                }
                self.check_text_len(text, "message")
            }
            RawInput::Image { media, caption } => {
                self.check_caption(caption.as_deref())?;
                check_bytes(media, self.limits.max_image_bytes, "image")
            }
            RawInput::Voice { media } => check_bytes(media, self.limits.max_audio_bytes, "voice message"),
            RawInput::Document { media, caption } => {
                self.check_caption(caption.as_deref())?;
                let mime = base_mime(&media.mime_type);
                if !self.limits.allowed_document_types.iter().any(|t| *t == mime) {
                    return Err(AnanyaError::validation(format!("unsupported document type '{mime}'")));
                }
                check_bytes(media, self.limits.max_document_bytes, "document")
            }
        }
    }

    /// Validate and convert `raw` into a canonical request.
    #[instrument(skip(self, raw), fields(kind = %raw.kind()))]
    pub async fn normalize(&self, raw: RawInput) -> Result<NormalizedRequest> {
        self.validate(&raw)?;
        let request = match raw {
            RawInput::Text { text } => NormalizedRequest::text(text),
            RawInput::Image { media, caption } => {
                NormalizedRequest::with_media(MediaKind::Image, clean_caption(caption), media)
            }
            RawInput::Document { media, caption } => {
                NormalizedRequest::with_media(MediaKind::Document, clean_caption(caption), media)
            }
            RawInput::Voice { media } => {
                let text = self.transcribe(&media).await;
                NormalizedRequest::with_media(MediaKind::Voice, text, media)
            }
        };
        Ok(request)
    }

    /// Transcript of a voice note, or empty text on any failure.
    async fn transcribe(&self, media: &MediaRef) -> String {
        let Some(transcriber) = &self.transcriber else {
            return String::new();
        };
        if !transcriber.is_ready() {
            warn!("transcriber not ready, forwarding raw audio");
            counter!("transcription_failures_total", "reason" => "not_ready").increment(1);
            return String::new();
        }
        let call = transcriber.transcribe(&media.data, &media.mime_type);
        match tokio::time::timeout(self.transcription_timeout, call).await {
            Ok(Ok(result)) => {
                debug!(chars = result.text.len(), language = %result.language, "voice note transcribed");
                result.text.trim().to_owned()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "transcription failed, forwarding raw audio");
                counter!("transcription_failures_total", "reason" => "error").increment(1);
                String::new()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.transcription_timeout.as_millis() as u64,
                    "transcription timed out, forwarding raw audio"
                );
                counter!("transcription_failures_total", "reason" => "timeout").increment(1);
                String::new()
            }
        }
    }

    fn check_text_len(&self, text: &str, what: &str) -> Result<()> {
        let len = char_len(text);
        if len > self.limits.max_text_chars {
            return Err(AnanyaError::validation(format!(
                "{what} is too long ({len} characters, limit {})",
                self.limits.max_text_chars
            )));
        }
        Ok(())
    }

    fn check_caption(&self, caption: Option<&str>) -> Result<()> {
        caption.map_or(Ok(()), |c| self.check_text_len(c, "caption"))
    }
}

fn check_bytes(media: &MediaRef, max: usize, what: &str) -> Result<()> {
    if media.is_empty() {
        return Err(AnanyaError::validation(format!("{what} is empty")));
    }
    if media.len() > max {
        return Err(AnanyaError::validation(format!(
            "{what} is too large ({} bytes, limit {max})",
            media.len()
        )));
    }
    Ok(())
}

/// `text/plain; charset=utf-8` → `text/plain`.
fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn clean_caption(caption: Option<String>) -> String {
    caption.map(|c| c.trim().to_owned()).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
