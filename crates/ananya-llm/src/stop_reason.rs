//! # Finish Reason Mapping
//!
//! Maps Gemini finish reasons to a unified [`FinishReason`].

use serde::{Deserialize, Serialize};

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Normal completion.
    EndTurn,
    /// Output token budget exhausted.
    MaxTokens,
    /// Blocked by a safety or content filter.
    ContentFilter,
    /// Anything else the backend reports.
    Other,
}

impl FinishReason {
    /// Whether the reply was withheld by a content policy.
    #[must_use]
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::ContentFilter)
    }
}

/// Map a Google/Gemini finish reason.
///
/// Gemini API uses:
/// - `"STOP"` -> normal completion
/// - `"MAX_TOKENS"` -> max tokens reached
/// - `"SAFETY"`, `"RECITATION"`, `"BLOCKLIST"`, `"PROHIBITED_CONTENT"`, `"SPII"` -> filtered
/// - missing -> normal completion
pub fn map_google_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        None | Some("STOP" | "FINISH_REASON_UNSPECIFIED") => FinishReason::EndTurn,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY") => {
            FinishReason::ContentFilter
        }
        Some(_) => FinishReason::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_stop() {
        assert_eq!(map_google_finish_reason(Some("STOP")), FinishReason::EndTurn);
        assert_eq!(map_google_finish_reason(None), FinishReason::EndTurn);
    }

    #[test]
    fn google_max_tokens() {
        assert_eq!(map_google_finish_reason(Some("MAX_TOKENS")), FinishReason::MaxTokens);
    }

    #[test]
    fn google_safety_variants_are_blocked() {
        for reason in ["SAFETY", "RECITATION", "PROHIBITED_CONTENT"] {
            assert!(map_google_finish_reason(Some(reason)).is_blocked());
        }
    }

    #[test]
    fn google_unknown() {
        assert_eq!(map_google_finish_reason(Some("MALFORMED_FUNCTION_CALL")), FinishReason::Other);
    }
}
