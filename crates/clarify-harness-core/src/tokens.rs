//! Deterministic token counting for chat accounting.

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Counts tokens in message text. Implementations must be deterministic:
/// the same text always yields the same count.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> i64;
}

/// `ceil(chars / 4)`. Used when no tokenizer vocabulary is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> i64 {
        text.chars().count().div_ceil(CHARS_PER_TOKEN) as i64
    }
}
