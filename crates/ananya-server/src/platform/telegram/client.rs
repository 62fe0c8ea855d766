//! Bot API HTTP client.
//!
//! Methods are called as `POST {api}/bot{token}/{method}` with a JSON body;
//! files download from `{api}/file/bot{token}/{path}`. Every call carries a
//! timeout. Long polls get the poll window on top of the request timeout.

use std::fmt;
use std::time::Duration;

use ananya_settings::TelegramSettings;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::errors::TelegramError;
use super::types::{ApiResponse, File, GetFile, GetUpdates, SendMessage, Update};

/// Update kinds the bot subscribes to.
const ALLOWED_UPDATES: &[&str] = &["message"];

/// Bot API client.
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    request_timeout: Duration,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Client for `api_base` authenticated with `token`.
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, request_timeout: Duration) -> Result<Self, TelegramError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(TelegramError::MissingToken);
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(TelegramError::from_reqwest)?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token: token.trim().to_owned(),
            request_timeout,
        })
    }

    /// Client configured from settings.
    pub fn from_settings(settings: &TelegramSettings) -> Result<Self, TelegramError> {
        let token = settings.bot_token.clone().ok_or(TelegramError::MissingToken)?;
        Self::new(
            settings.api_base_url.clone(),
            token,
            Duration::from_millis(settings.request_timeout_ms),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(TelegramError::from_reqwest)?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(TelegramError::from_reqwest)?;
        let envelope: ApiResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !(200..300).contains(&status) => {
                return Err(TelegramError::Api {
                    status,
                    description: format!("{method} returned HTTP {status}"),
                    retry_after: None,
                });
            }
            Err(e) => return Err(TelegramError::Decode(format!("{method}: {e}"))),
        };

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| TelegramError::Decode(format!("{method} returned ok without a result")));
        }
        Err(TelegramError::Api {
            status: envelope.error_code.unwrap_or(status),
            description: envelope.description.unwrap_or_else(|| "unknown error".into()),
            retry_after: envelope
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs),
        })
    }

    /// Send a text message.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text }, self.request_timeout)
            .await?;
        Ok(())
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };
        let updates: Vec<Update> = self
            .call("getUpdates", &body, self.request_timeout + Duration::from_secs(timeout_secs))
            .await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    /// Resolve a file handle to its download path.
    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &GetFile { file_id }, self.request_timeout).await
    }

    /// Download a file by the path `getFile` returned.
    pub async fn download(&self, file_path: &str) -> Result<Bytes, TelegramError> {
        let url = format!("{}/file/bot{}/{file_path}", self.api_base, self.token);
        let response = self.http.get(url).send().await.map_err(TelegramError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                description: format!("file download failed for {file_path}"),
                retry_after: None,
            });
        }
        response.bytes().await.map_err(TelegramError::from_reqwest)
    }

    /// `getFile` followed by `download`.
    #[instrument(skip(self))]
    pub async fn fetch_file(&self, file_id: &str) -> Result<Bytes, TelegramError> {
        let file = self.get_file(file_id).await?;
        let path = file.file_path.ok_or_else(|| TelegramError::MissingFilePath {
            file_id: file_id.to_owned(),
        })?;
        let data = self.download(&path).await?;
        debug!(bytes = data.len(), "downloaded file");
        Ok(data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
