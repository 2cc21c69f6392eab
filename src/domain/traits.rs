// ============================================================
// Layer 3 — Core Traits
// ============================================================
// The data and ML layers only need three things from a
// tokenizer: text → ids, ids → text, and how many ids exist.
// Programming against this trait keeps the datasets and the
// introspection utility independent of how the vocabulary
// was built.

use anyhow::Result;

/// Anything that maps text to token ids and back.
pub trait TextTokenizer {
    /// Token ids for `text`; unknown words map to the unknown id.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Space-joined tokens for `ids`; ids outside the vocabulary decode to the unknown token.
    fn decode(&self, ids: &[u32]) -> String;

    /// Exclusive upper bound on every id `encode` can produce.
    fn vocab_size(&self) -> usize;
}
