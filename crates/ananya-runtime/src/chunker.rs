//! Response chunking for the outbound transport.

use ananya_core::constants::PLATFORM_MESSAGE_LIMIT;
use ananya_core::text::chunk_text;

/// Splits model output into messages no longer than the platform limit.
#[derive(Clone, Copy, Debug)]
pub struct ResponseChunker {
    limit: usize,
}

impl Default for ResponseChunker {
    fn default() -> Self {
        Self::new(PLATFORM_MESSAGE_LIMIT)
    }
}

impl ResponseChunker {
    /// Chunker with a per-message limit in characters, clamped to `[1, PLATFORM_MESSAGE_LIMIT]`.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.clamp(1, PLATFORM_MESSAGE_LIMIT),
        }
    }

    /// Effective limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Ordered chunks whose concatenation is `text`.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped_to_platform_ceiling() {
        assert_eq!(ResponseChunker::new(10_000).limit(), PLATFORM_MESSAGE_LIMIT);
        assert_eq!(ResponseChunker::new(0).limit(), 1);
    }

    #[test]
    fn short_reply_is_one_chunk() {
        assert_eq!(ResponseChunker::default().chunk("namaste"), vec!["namaste"]);
    }

    #[test]
    fn long_reply_round_trips() {
        let text = "word ".repeat(2000);
        let chunks = ResponseChunker::default().chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= PLATFORM_MESSAGE_LIMIT));
        assert_eq!(chunks.concat(), text);
    }
}
