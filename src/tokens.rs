//! Token counting against a BPE vocabulary.
//!
//! The counter is an injected dependency: the [`Client`](crate::client::Client),
//! the collation helpers, and the chunker all receive a shared handle rather
//! than reaching for a process-wide singleton, which keeps tests hermetic.
//!
//! Counts are computed with the `o200k_base` encoding and are approximate
//! relative to whatever tokenizer the selected backend actually runs. Every
//! budget in the pipeline treats them as estimates and leaves headroom.

use crate::error::Result;
use tiktoken_rs::CoreBPE;

/// Counts tokens of text fragments against a fixed BPE encoding.
pub struct TokenCounter {
    bpe: CoreBPE,
}

impl TokenCounter {
    /// Load the encoding. This is the expensive step; construct once and
    /// share via `Arc`.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::o200k_base()?;
        Ok(Self { bpe })
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter").finish_non_exhaustive()
    }
}
