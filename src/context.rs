//! # Context Management
//!
//! Rough token accounting and history truncation so a long-running session
//! doesn't silently overflow a model's context window. Token counts here
//! are an estimate, not a tokenizer: good enough to decide when to trim,
//! not to bill against.

use crate::message::Message;

/// Rough characters-per-token ratio for English text, the same heuristic
/// most local-model front ends use when a real tokenizer isn't available.
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a single string.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the total token count of a message history, including a fixed
/// per-message overhead for role/metadata framing.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    const PER_MESSAGE_OVERHEAD: usize = 4;
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content) + PER_MESSAGE_OVERHEAD)
        .sum()
}

/// True once estimated usage has crossed `ratio` of `limit` (e.g. `ratio =
/// 0.9` for a 90% warning threshold).
pub fn is_approaching_limit(messages: &[Message], limit: usize, ratio: f64) -> bool {
    let used = estimate_messages_tokens(messages);
    (used as f64) >= (limit as f64) * ratio
}

/// Drop the oldest messages until the remaining history fits within
/// `limit` tokens, always keeping at least the most recent message.
pub fn truncate_messages(messages: &[Message], limit: usize) -> Vec<Message> {
    if messages.is_empty() {
        return Vec::new();
    }
    let mut kept: Vec<Message> = Vec::new();
    let mut total = 0usize;
    for message in messages.iter().rev() {
        let cost = estimate_tokens(&message.content) + 4;
        if total + cost > limit && !kept.is_empty() {
            break;
        }
        total += cost;
        kept.push(message.clone());
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_is_approaching_limit() {
        let messages = vec![Message::user("x".repeat(400))];
        assert!(is_approaching_limit(&messages, 100, 0.9));
        assert!(!is_approaching_limit(&messages, 10_000, 0.9));
    }

    #[test]
    fn test_truncate_keeps_most_recent() {
        let messages = vec![
            Message::user("a".repeat(100)),
            Message::user("b".repeat(100)),
            Message::user("c".repeat(100)),
        ];
        let truncated = truncate_messages(&messages, 30);
        assert_eq!(truncated.len(), 1);
        assert!(truncated[0].content.starts_with('c'));
    }

    #[test]
    fn test_truncate_always_keeps_at_least_one() {
        let messages = vec![Message::user("x".repeat(10_000))];
        let truncated = truncate_messages(&messages, 1);
        assert_eq!(truncated.len(), 1);
    }

    #[test]
    fn test_truncate_empty_history() {
        assert!(truncate_messages(&[], 100).is_empty());
    }
}
