//! Conversation turns.
//!
//! A [`Turn`] is immutable once created: fields are private and only
//! readable through accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{MediaKind, NormalizedRequest};

/// Author of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant (model output).
    Assistant,
}

impl Role {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a label produced by [`Role::as_str`].
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One exchange unit in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    role: Role,
    kind: MediaKind,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Turn {
    /// User turn recorded from a normalized request.
    #[must_use]
    pub fn user(request: &NormalizedRequest) -> Self {
        Self {
            role: Role::User,
            kind: request.kind,
            content: request.history_text(),
            timestamp: Utc::now(),
        }
    }

    /// Assistant turn holding model output.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            kind: MediaKind::Text,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Rebuild a turn from persisted parts.
    #[must_use]
    pub fn from_parts(role: Role, kind: MediaKind, content: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            kind,
            content,
            timestamp,
        }
    }

    /// Author of the turn.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Kind of payload the turn was created from.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Canonical text content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_from_request() {
        let turn = Turn::user(&NormalizedRequest::text("hi"));
        assert_eq!(turn.role(), Role::User);
        assert_eq!(turn.kind(), MediaKind::Text);
        assert_eq!(turn.content(), "hi");
    }

    #[test]
    fn assistant_turn() {
        let turn = Turn::assistant("hello!");
        assert_eq!(turn.role(), Role::Assistant);
        assert_eq!(turn.content(), "hello!");
    }

    #[test]
    fn role_labels_roundtrip() {
        assert_eq!(Role::parse(Role::User.as_str()), Some(Role::User));
        assert_eq!(Role::parse(Role::Assistant.as_str()), Some(Role::Assistant));
        assert_eq!(Role::parse("model"), None);
    }

    #[test]
    fn serde_uses_camel_case() {
        let turn = Turn::assistant("x");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["kind"], "text");
        assert!(json.get("timestamp").is_some());
    }
}
