//! Engine-wide constants.

/// Maximum number of characters a single outbound platform message may carry.
pub const PLATFORM_MESSAGE_LIMIT: usize = 4000;

/// Default number of turns retained per user context.
pub const DEFAULT_CONTEXT_TURNS: usize = 10;

/// Display name of the assistant persona.
pub const PERSONA_NAME: &str = "Ananya";

/// Notice sent to users who have been blocked by an operator.
pub const BLOCKED_NOTICE: &str = "Sorry, you are blocked from using this bot.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_limit_matches_chat_transport() {
        assert_eq!(PLATFORM_MESSAGE_LIMIT, 4000);
    }

    #[test]
    fn context_window_default() {
        assert_eq!(DEFAULT_CONTEXT_TURNS, 10);
    }
}
