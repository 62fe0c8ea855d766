//! Inbound payload types.
//!
//! - [`RawInput`]: what the chat platform handed us (text, photo, voice, document)
//! - [`NormalizedRequest`]: the canonical request the model backend consumes
//! - [`MediaRef`]: opaque handle to caller-owned media bytes

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Kind of an inbound payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Plain text message.
    Text,
    /// Photo or image upload.
    Image,
    /// Voice note or audio clip.
    Voice,
    /// Arbitrary file upload.
    Document,
}

impl MediaKind {
    /// Stable lowercase label (used in metrics and persistence).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Document => "document",
        }
    }

    /// Parse a label produced by [`MediaKind::as_str`].
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "voice" => Some(Self::Voice),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to media bytes owned by the caller.
///
/// Cloning is cheap (reference-counted buffer).
#[derive(Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// MIME type reported by the platform (or inferred).
    pub mime_type: String,
    /// Original file name, when the platform supplies one.
    pub file_name: Option<String>,
    /// Raw bytes.
    pub data: Bytes,
}

impl MediaRef {
    /// Create a media reference.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            file_name: None,
            data: data.into(),
        }
    }

    /// Attach an original file name.
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaRef")
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Payload as received from the chat platform, before normalization.
#[derive(Clone, Debug)]
pub enum RawInput {
    /// Plain text message.
    Text {
        /// Message body.
        text: String,
    },
    /// Photo with optional caption.
    Image {
        /// Image bytes.
        media: MediaRef,
        /// Caption typed alongside the photo.
        caption: Option<String>,
    },
    /// Voice note or audio clip.
    Voice {
        /// Audio bytes.
        media: MediaRef,
    },
    /// File upload with optional caption.
    Document {
        /// File bytes.
        media: MediaRef,
        /// Caption typed alongside the file.
        caption: Option<String>,
    },
}

impl RawInput {
    /// Kind of this payload.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Text { .. } => MediaKind::Text,
            Self::Image { .. } => MediaKind::Image,
            Self::Voice { .. } => MediaKind::Voice,
            Self::Document { .. } => MediaKind::Document,
        }
    }
}

/// Canonical request handed to the model backend.
///
/// `text` is always present for [`MediaKind::Text`]; for other kinds it holds
/// the caption or transcript and may be empty, in which case `media` carries
/// the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedRequest {
    /// Kind of the original payload.
    pub kind: MediaKind,
    /// Text content (message body, caption, or transcript).
    pub text: String,
    /// Raw media, when the payload was not plain text.
    pub media: Option<MediaRef>,
}

impl NormalizedRequest {
    /// Plain text request.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Text,
            text: text.into(),
            media: None,
        }
    }

    /// Media request with accompanying text (possibly empty).
    #[must_use]
    pub fn with_media(kind: MediaKind, text: impl Into<String>, media: MediaRef) -> Self {
        Self {
            kind,
            text: text.into(),
            media: Some(media),
        }
    }

    /// Text recorded in the conversation history for this request.
    ///
    /// Non-text payloads without any text get a short placeholder so the
    /// history still shows that the user sent something.
    #[must_use]
    pub fn history_text(&self) -> String {
        if !self.text.is_empty() {
            return self.text.clone();
        }
        match self.kind {
            MediaKind::Text => String::new(),
            MediaKind::Image => "[image]".into(),
            MediaKind::Voice => "[voice message]".into(),
            MediaKind::Document => match self.media.as_ref().and_then(|m| m.file_name.as_deref()) {
                Some(name) => format!("[document: {name}]"),
                None => "[document]".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_roundtrip() {
        for kind in [MediaKind::Text, MediaKind::Image, MediaKind::Voice, MediaKind::Document] {
            assert_eq!(MediaKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MediaKind::parse("sticker"), None);
    }

    #[test]
    fn media_debug_hides_bytes() {
        let media = MediaRef::new("image/jpeg", vec![1u8, 2, 3]);
        let dbg = format!("{media:?}");
        assert!(dbg.contains("bytes: 3"));
        assert!(!dbg.contains("[1, 2, 3]"));
    }

    #[test]
    fn history_text_prefers_text() {
        let req = NormalizedRequest::with_media(
            MediaKind::Image,
            "look at this",
            MediaRef::new("image/jpeg", vec![0u8]),
        );
        assert_eq!(req.history_text(), "look at this");
    }

    #[test]
    fn history_text_placeholders() {
        let voice = NormalizedRequest::with_media(MediaKind::Voice, "", MediaRef::new("audio/ogg", vec![0u8]));
        assert_eq!(voice.history_text(), "[voice message]");

        let doc = NormalizedRequest::with_media(
            MediaKind::Document,
            "",
            MediaRef::new("application/pdf", vec![0u8]).with_file_name("report.pdf"),
        );
        assert_eq!(doc.history_text(), "[document: report.pdf]");
    }

    #[test]
    fn raw_input_kind() {
        let raw = RawInput::Voice {
            media: MediaRef::new("audio/ogg", Vec::<u8>::new()),
        };
        assert_eq!(raw.kind(), MediaKind::Voice);
    }
}
