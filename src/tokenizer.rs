//! Token counter selection.
//!
//! With `[tokenizer] path` set (and the `hf-tokenizer` feature enabled)
//! token counts come from a fixed Hugging Face `tokenizer.json`
//! vocabulary; otherwise the core 4-chars-per-token heuristic is used.

use anyhow::Result;
use std::sync::Arc;

use clarify_harness_core::tokens::{HeuristicTokenCounter, TokenCounter};

use crate::config::TokenizerConfig;

/// Counts tokens with a Hugging Face tokenizer loaded once at startup.
#[cfg(feature = "hf-tokenizer")]
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
}

#[cfg(feature = "hf-tokenizer")]
impl HfTokenCounter {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer {}: {}", path.display(), e))?;
        Ok(Self { tokenizer })
    }
}

#[cfg(feature = "hf-tokenizer")]
impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> i64 {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len() as i64,
            Err(e) => {
                tracing::warn!(error = %e, "tokenizer failed; falling back to heuristic count");
                HeuristicTokenCounter.count(text)
            }
        }
    }
}

pub fn create_token_counter(config: &TokenizerConfig) -> Result<Arc<dyn TokenCounter>> {
    match &config.path {
        None => Ok(Arc::new(HeuristicTokenCounter)),
        #[cfg(feature = "hf-tokenizer")]
        Some(path) => Ok(Arc::new(HfTokenCounter::from_file(path)?)),
        #[cfg(not(feature = "hf-tokenizer"))]
        Some(path) => anyhow::bail!(
            "tokenizer.path = {} requires --features hf-tokenizer",
            path.display()
        ),
    }
}
