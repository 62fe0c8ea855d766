//! Bot API wire types. Only the fields the bot reads are modelled.

use serde::{Deserialize, Serialize};

/// Envelope around every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload on success.
    pub result: Option<T>,
    /// Error text on failure.
    pub description: Option<String>,
    /// Error code on failure (mirrors the HTTP status).
    pub error_code: Option<u16>,
    /// Extra failure detail.
    pub parameters: Option<ResponseParameters>,
}

/// Failure detail.
#[derive(Debug, Default, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying after a flood-control error.
    pub retry_after: Option<u64>,
}

/// One incoming update.
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// New incoming message.
    pub message: Option<Message>,
}

/// An incoming message.
#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    /// Identifier within the chat.
    pub message_id: i64,
    /// Sender. Absent for channel posts.
    pub from: Option<User>,
    /// Conversation the message belongs to.
    pub chat: Chat,
    /// Text body.
    pub text: Option<String>,
    /// Caption of a media message.
    pub caption: Option<String>,
    /// Photo in several sizes, smallest first.
    pub photo: Option<Vec<PhotoSize>>,
    /// Voice note.
    pub voice: Option<Voice>,
    /// Audio file.
    pub audio: Option<Audio>,
    /// Generic file.
    pub document: Option<Document>,
}

/// A Telegram user.
#[derive(Clone, Debug, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: i64,
    /// Whether this is a bot account.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    pub first_name: Option<String>,
    /// `@handle` without the `@`.
    pub username: Option<String>,
}

/// A chat.
#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    /// Chat identifier. Equals the user id for private chats.
    pub id: i64,
    /// `private`, `group`, `supergroup`, or `channel`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// One size of a photo.
#[derive(Clone, Debug, Deserialize)]
pub struct PhotoSize {
    /// Download handle.
    pub file_id: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// A voice note.
#[derive(Clone, Debug, Deserialize)]
pub struct Voice {
    /// Download handle.
    pub file_id: String,
    /// MIME type as sent by the client.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// An audio file.
#[derive(Clone, Debug, Deserialize)]
pub struct Audio {
    /// Download handle.
    pub file_id: String,
    /// MIME type as sent by the client.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// A generic file.
#[derive(Clone, Debug, Deserialize)]
pub struct Document {
    /// Download handle.
    pub file_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// MIME type as sent by the client.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Result of `getFile`.
#[derive(Clone, Debug, Deserialize)]
pub struct File {
    /// Download handle.
    pub file_id: String,
    /// Size in bytes.
    pub file_size: Option<u64>,
    /// Path for the file download endpoint.
    pub file_path: Option<String>,
}

/// `sendMessage` body.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    /// Target chat.
    pub chat_id: i64,
    /// Message text.
    pub text: &'a str,
}

/// `getUpdates` body.
#[derive(Debug, Serialize)]
pub struct GetUpdates {
    /// First update to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Long-poll timeout in seconds.
    pub timeout: u64,
    /// Update kinds to receive.
    pub allowed_updates: &'static [&'static str],
}

/// `getFile` body.
#[derive(Debug, Serialize)]
pub struct GetFile<'a> {
    /// Download handle.
    pub file_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_update() {
        let raw = json!({
            "update_id": 7,
            "message": {
                "message_id": 1,
                "date": 1_700_000_000,
                "from": {"id": 42, "is_bot": false, "first_name": "Meera", "language_code": "hi"},
                "chat": {"id": 42, "type": "private"},
                "text": "namaste"
            }
        });
        let update: Update = serde_json::from_value(raw).unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.from.unwrap().first_name.as_deref(), Some("Meera"));
        assert_eq!(message.chat.kind, "private");
        assert_eq!(message.text.as_deref(), Some("namaste"));
    }

    #[test]
    fn parses_error_envelope() {
        let raw = json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 5",
            "parameters": {"retry_after": 5}
        });
        let resp: ApiResponse<bool> = serde_json::from_value(raw).unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error_code, Some(429));
        assert_eq!(resp.parameters.unwrap().retry_after, Some(5));
    }

    #[test]
    fn get_updates_omits_missing_offset() {
        let body = serde_json::to_value(GetUpdates {
            offset: None,
            timeout: 30,
            allowed_updates: &["message"],
        })
        .unwrap();
        assert!(body.get("offset").is_none());
        assert_eq!(body["timeout"], 30);
    }
}
