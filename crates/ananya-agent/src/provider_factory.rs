//! Backend construction from settings.

use std::sync::Arc;
use std::time::Duration;

use ananya_llm::LanguageModel;
use ananya_llm::google::{GenerationConfig, GoogleConfig, GoogleProvider};
use ananya_settings::AnanyaSettings;
use ananya_transcription::{SidecarTranscriber, Transcriber};
use anyhow::{Context, Result, bail};
use tracing::info;

/// Gemini configuration for the configured model.
pub fn google_config(settings: &AnanyaSettings) -> Result<GoogleConfig> {
    let model = &settings.model;
    if model.provider != "google" {
        bail!("unsupported model provider '{}'", model.provider);
    }
    let api_key = model
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .context("no model API key configured (set ANANYA_GEMINI_API_KEY)")?;
    Ok(GoogleConfig {
        model: model.model.clone(),
        base_url: model.base_url.clone(),
        generation: GenerationConfig {
            temperature: model.temperature,
            top_p: model.top_p,
            top_k: model.top_k,
            max_output_tokens: model.max_output_tokens,
        },
        timeout: Duration::from_millis(model.timeout_ms),
        ..GoogleConfig::new(api_key)
    })
}

/// Language model for the configured provider.
pub fn language_model(settings: &AnanyaSettings) -> Result<Arc<dyn LanguageModel>> {
    let config = google_config(settings)?;
    info!(model = %config.model, "using google model");
    let provider = GoogleProvider::new(config).context("failed to build model client")?;
    Ok(Arc::new(provider))
}

/// Speech-to-text sidecar, when enabled.
pub fn transcriber(settings: &AnanyaSettings) -> Result<Option<Arc<dyn Transcriber>>> {
    let stt = &settings.transcription;
    if !stt.enabled {
        info!("transcription disabled, voice notes are forwarded as audio");
        return Ok(None);
    }
    let client = SidecarTranscriber::new(stt.base_url.clone(), Duration::from_millis(stt.timeout_ms))
        .context("failed to build transcription client")?
        .with_max_audio_bytes(settings.input.max_audio_bytes);
    info!(url = %stt.base_url, "transcription sidecar enabled");
    Ok(Some(Arc::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_an_error() {
        let settings = AnanyaSettings::default();
        let err = google_config(&settings).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn config_follows_settings() {
        let mut settings = AnanyaSettings::default();
        settings.model.api_key = Some(" key ".into());
        settings.model.model = "gemini-2.5-pro".into();
        settings.model.top_k = 20;
        let config = google_config(&settings).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.generation.top_k, 20);
        assert_eq!(config.timeout, Duration::from_millis(settings.model.timeout_ms));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut settings = AnanyaSettings::default();
        settings.model.provider = "other".into();
        settings.model.api_key = Some("key".into());
        assert!(google_config(&settings).is_err());
    }

    #[test]
    fn transcriber_follows_flag() {
        let mut settings = AnanyaSettings::default();
        settings.transcription.enabled = false;
        assert!(transcriber(&settings).unwrap().is_none());
        settings.transcription.enabled = true;
        assert!(transcriber(&settings).unwrap().is_some());
    }
}
