//! Token estimation for context-window accounting.
//!
//! Exact token counting is backend specific, so the engine only relies on
//! a pluggable estimate.

use conclave_types::message::Message;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates the token cost of text passed to a completion provider.
pub trait TokenEstimator: Send + Sync {
    /// Estimated tokens for a piece of text.
    fn estimate(&self, text: &str) -> u32;

    /// Estimated tokens for a timeline message as it appears in history
    /// (sender prefix included).
    fn estimate_message(&self, message: &Message) -> u32 {
        let prefix = message.sender_name.len() + 4;
        let chars = message.text.len() + prefix;
        self.estimate_chars(chars)
    }

    /// Estimated tokens for a raw character count.
    fn estimate_chars(&self, chars: usize) -> u32;
}

/// Default estimator: about four characters per token, and at least one
/// token for any non-empty input.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimator;

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> u32 {
        self.estimate_chars(text.len())
    }

    fn estimate_chars(&self, chars: usize) -> u32 {
        if chars == 0 {
            return 0;
        }
        (chars / CHARS_PER_TOKEN).max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn empty_text_costs_nothing() {
        assert_eq!(CharEstimator.estimate(""), 0);
    }

    #[test]
    fn short_text_costs_at_least_one_token() {
        assert_eq!(CharEstimator.estimate("hi"), 1);
        assert_eq!(CharEstimator.estimate("abcdefgh"), 2);
    }

    #[test]
    fn message_estimate_includes_sender_prefix() {
        let msg = Message::user(Uuid::now_v7(), "you", "x".repeat(40), vec![]);
        // 40 chars of text + "you" + 4 framing chars = 47 chars
        assert_eq!(CharEstimator.estimate_message(&msg), 11);
    }
}
