//! UTF-8–safe text utilities.
//!
//! Rust `&str[..n]` panics when `n` falls inside a multi-byte character.
//! These helpers find the nearest char boundary so slicing is always safe.
//!
//! [`chunk_text`] splits outbound replies into platform-sized messages.
//! Lengths there are counted in Unicode scalar values (`char`s).

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
///
/// Returns the longest prefix of `s` whose byte length is ≤ `max_bytes`
/// and that does not split a multi-byte character.
#[inline]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Number of characters (Unicode scalar values) in `s`.
#[inline]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Response chunking
// ─────────────────────────────────────────────────────────────────────────────

/// Split `text` into ordered chunks of at most `limit` characters each.
///
/// - Concatenating the chunks reproduces `text` exactly.
/// - Every chunk is non-empty; an empty input yields no chunks.
/// - A chunk ends after the last whitespace character inside its window, so
///   the whitespace stays with the preceding chunk. A window immediately
///   followed by whitespace is also a clean boundary.
/// - A window with no whitespace is hard-split at exactly `limit` characters.
///
/// A `limit` of zero is treated as one.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        // Byte offset of the first char past the window; `None` means the rest fits.
        let Some((window_end, next)) = rest.char_indices().nth(limit) else {
            chunks.push(rest.to_owned());
            break;
        };

        let split = if next.is_whitespace() {
            window_end
        } else {
            rest[..window_end]
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map_or(window_end, |(i, c)| i + c.len_utf8())
        };

        let (head, tail) = rest.split_at(split);
        chunks.push(head.to_owned());
        rest = tail;
    }

    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ── truncate_str ─────────────────────────────────────────────────────

    #[test]
    fn ascii_truncated() {
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn multibyte_boundary_snaps_back() {
        // 'é' is 2 bytes at 3..5
        assert_eq!(truncate_str("café", 4), "caf");
        assert_eq!(truncate_str("café", 5), "café");
        // '🦀' is 4 bytes at 2..6
        assert_eq!(truncate_str("hi🦀bye", 5), "hi");
    }

    // ── chunk_text ───────────────────────────────────────────────────────

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 4000).is_empty());
    }

    #[test]
    fn short_input_is_single_chunk() {
        assert_eq!(chunk_text("hello there", 4000), vec!["hello there"]);
    }

    #[test]
    fn exact_limit_is_single_chunk() {
        let text = "a".repeat(4000);
        assert_eq!(chunk_text(&text, 4000), vec![text]);
    }

    #[test]
    fn splits_after_last_whitespace_in_window() {
        // Whitespace at unit 3990 (index 3989), none after it until the end.
        let mut text = "a".repeat(3989);
        text.push(' ');
        text.push_str(&"b".repeat(9000 - 3990));
        assert_eq!(char_len(&text), 9000);

        let chunks = chunk_text(&text, 4000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(char_len(&chunks[0]), 3990);
        assert!(chunks[0].ends_with(' '));
        assert_eq!(char_len(&chunks[1]), 4000);
        assert_eq!(char_len(&chunks[2]), 1010);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn hard_splits_unbroken_token() {
        let text = "x".repeat(10_000);
        let chunks = chunk_text(&text, 4000);
        let lens: Vec<usize> = chunks.iter().map(|c| char_len(c)).collect();
        assert_eq!(lens, vec![4000, 4000, 2000]);
    }

    #[test]
    fn window_followed_by_whitespace_splits_cleanly() {
        assert_eq!(chunk_text("abcd efgh", 4), vec!["abcd", " ", "efgh"]);
        assert_eq!(chunk_text("abc defg", 4), vec!["abc ", "defg"]);
    }

    #[test]
    fn newline_is_a_boundary() {
        assert_eq!(chunk_text("line one\nline two", 12), vec!["line one\n", "line two"]);
    }

    #[test]
    fn never_splits_multibyte_chars() {
        let text = "नमस्ते दुनिया 🦀🦀🦀 café".repeat(50);
        for limit in [1, 3, 7, 64] {
            let chunks = chunk_text(&text, limit);
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| char_len(c) <= limit));
        }
    }

    #[test]
    fn zero_limit_behaves_as_one() {
        assert_eq!(chunk_text("ab", 0), vec!["a", "b"]);
    }

    #[test]
    fn idempotent_over_concatenation() {
        let text = "word ".repeat(2000);
        let once = chunk_text(&text, 4000);
        let twice = chunk_text(&once.concat(), 4000);
        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn chunks_roundtrip_and_respect_limit(text in "\\PC{0,600}", limit in 1usize..120) {
            let chunks = chunk_text(&text, limit);
            prop_assert_eq!(chunks.concat(), text.clone());
            prop_assert!(chunks.iter().all(|c| !c.is_empty()));
            prop_assert!(chunks.iter().all(|c| char_len(c) <= limit));
            prop_assert_eq!(chunk_text(&chunks.concat(), limit), chunks.clone());
        }

        #[test]
        fn no_mid_word_split_when_window_has_whitespace(
            words in proptest::collection::vec("[a-z]{1,8}", 1..80),
            limit in 10usize..60,
        ) {
            let text = words.join(" ");
            let chunks = chunk_text(&text, limit);
            for pair in chunks.windows(2) {
                let boundary_clean = pair[0].ends_with(' ') || pair[1].starts_with(' ');
                let forced = !pair[0].contains(' ');
                prop_assert!(boundary_clean || forced, "split mid-word: {:?} | {:?}", pair[0], pair[1]);
            }
        }
    }
}
