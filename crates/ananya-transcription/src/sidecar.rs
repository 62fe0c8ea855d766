//! HTTP transcription sidecar client.
//!
//! POSTs audio as multipart (`audio` field) to `{base_url}/transcribe` and
//! expects `{"text", "language", "duration_seconds"}` back.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::service::Transcriber;
use crate::types::{ResultExt, TranscriptionError, TranscriptionResult};

/// Default maximum audio payload (50 MB).
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 50 * 1024 * 1024;

/// Sidecar-backed transcriber.
pub struct SidecarTranscriber {
    base_url: String,
    client: reqwest::Client,
    max_audio_bytes: usize,
}

impl SidecarTranscriber {
    /// Create a client for the sidecar at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .backend("build http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
        })
    }

    /// Override the maximum accepted payload size.
    #[must_use]
    pub fn with_max_audio_bytes(mut self, max: usize) -> Self {
        self.max_audio_bytes = max;
        self
    }
}

/// File name whose extension matches the container format.
///
/// The sidecar picks its decoder from the extension; a mismatched one
/// (e.g. ogg bytes named `.wav`) fails to decode.
fn filename_for_mime(mime_type: &str) -> String {
    let ext = match mime_type {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/opus" | "audio/vorbis" => "ogg",
        "audio/webm" => "webm",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => "wav",
    };
    format!("audio.{ext}")
}

#[async_trait]
impl Transcriber for SidecarTranscriber {
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<TranscriptionResult, TranscriptionError> {
        if audio.len() > self.max_audio_bytes {
            return Err(TranscriptionError::AudioTooLarge {
                size: audio.len(),
                max: self.max_audio_bytes,
            });
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(filename_for_mime(mime_type))
            .mime_str(mime_type)
            .backend("build multipart")?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscriptionError::Timeout
                } else if e.is_connect() {
                    TranscriptionError::Unavailable(e.to_string())
                } else {
                    TranscriptionError::Backend(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "transcription sidecar returned error");
            return Err(TranscriptionError::Backend(format!("sidecar returned {status}: {body}")));
        }

        let result: TranscriptionResult = response.json().await.decode("parse sidecar response")?;
        debug!(chars = result.text.len(), language = %result.language, "transcribed voice note");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn filename_matches_container() {
        assert_eq!(filename_for_mime("audio/ogg"), "audio.ogg");
        assert_eq!(filename_for_mime("audio/mpeg"), "audio.mp3");
        assert_eq!(filename_for_mime("application/octet-stream"), "audio.wav");
    }

    #[tokio::test]
    async fn transcribes_via_sidecar() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "text": "namaste ananya",
                "language": "hi",
                "duration_seconds": 1.5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stt = SidecarTranscriber::new(server.uri(), Duration::from_secs(5)).unwrap();
        let result = stt.transcribe(b"OggS....", "audio/ogg").await.unwrap();
        assert_eq!(result.text, "namaste ananya");
        assert_eq!(result.language, "hi");
    }

    #[tokio::test]
    async fn sidecar_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let stt = SidecarTranscriber::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = stt.transcribe(b"x", "audio/ogg").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Backend(ref s) if s.contains("model crashed")));
    }

    #[tokio::test]
    async fn oversized_audio_is_rejected_locally() {
        let stt = SidecarTranscriber::new("http://127.0.0.1:9", Duration::from_secs(1))
            .unwrap()
            .with_max_audio_bytes(4);
        let err = stt.transcribe(b"12345", "audio/ogg").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioTooLarge { size: 5, max: 4 }));
    }

    #[tokio::test]
    async fn slow_sidecar_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"text": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let stt = SidecarTranscriber::new(server.uri(), Duration::from_millis(50)).unwrap();
        let err = stt.transcribe(b"x", "audio/ogg").await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Timeout));
    }
}
