//! [`Transport`] over the Bot API.

use std::sync::Arc;

use ananya_core::ids::UserId;
use ananya_runtime::{SendError, Transport};
use async_trait::async_trait;

use super::client::TelegramClient;
use super::errors::TelegramError;

/// Sends replies and broadcasts through `sendMessage`.
///
/// Private chats share the user's id, so the user id is the chat id.
#[derive(Clone, Debug)]
pub struct TelegramTransport {
    client: Arc<TelegramClient>,
}

impl TelegramTransport {
    /// Transport over `client`.
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), SendError> {
        self.client.send_message(user_id.get(), text).await.map_err(classify)
    }
}

const BLOCKED_BY_USER: &str = "blocked by the user";

/// Map a Bot API failure onto the delivery taxonomy.
///
/// A 403 whose description says the bot was blocked is `Blocked`; other 403s
/// (deactivated or kicked users) are final. 429, 5xx, and network failures
/// are worth retrying. Every other 4xx ("chat not found") is final.
pub fn classify(err: TelegramError) -> SendError {
    match err {
        TelegramError::Api {
            status: 403,
            description,
            ..
        } => {
            if description.to_ascii_lowercase().contains(BLOCKED_BY_USER) {
                SendError::Blocked
            } else {
                SendError::permanent(description)
            }
        }
        TelegramError::Api {
            status,
            description,
            retry_after,
        } if status == 429 || status >= 500 => SendError::Transient {
            reason: description,
            retry_after,
        },
        TelegramError::Api { description, .. } => SendError::permanent(description),
        TelegramError::Timeout => SendError::transient("telegram request timed out"),
        TelegramError::Network(reason) => SendError::transient(reason),
        other @ (TelegramError::Decode(_) | TelegramError::MissingToken | TelegramError::MissingFilePath { .. }) => {
            SendError::permanent(other.to_string())
        }
    }
}
