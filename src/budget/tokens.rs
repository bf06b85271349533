//! Length-based token estimates (~4 characters per token).

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

const CHARS_PER_TOKEN: u64 = 4;
const MIN_OUTPUT_TOKENS: u64 = 128;
const MAX_OUTPUT_TOKENS: u64 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenEstimate {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

fn chars_to_tokens(chars: u64) -> u64 {
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Estimate prompt and completion size for a conversation.
///
/// The completion guess is half the prompt, clamped to 128..=512 tokens.
pub fn estimate_tokens_from_messages(messages: &[ChatMessage]) -> TokenEstimate {
    let total_chars: u64 = messages
        .iter()
        .map(|m| m.content.chars().count() as u64)
        .sum();
    let input_tokens = chars_to_tokens(total_chars).max(1);
    let output_tokens = ((input_tokens as f64 * 0.5).round() as u64)
        .clamp(MIN_OUTPUT_TOKENS, MAX_OUTPUT_TOKENS);
    TokenEstimate::new(input_tokens, output_tokens)
}

/// Estimate the token count of a single piece of text. Empty text is zero tokens.
pub fn estimate_tokens_from_text(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    chars_to_tokens(text.chars().count() as u64).max(1)
}
