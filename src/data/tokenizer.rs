// ============================================================
// Layer 4 — Word-Level Tokenizer
// ============================================================
// Builds a word-level vocabulary from the training texts and
// wraps it in a HuggingFace `tokenizers::Tokenizer`.
//
// tokenizers 0.15 cannot train a WordLevel model without the
// ModelWrapper trainer dance, so the vocabulary is counted here
// and the tokenizer JSON is assembled directly, then parsed
// back with `Tokenizer::from_str`.
//
// Words are counted with the same `Whitespace` pre-tokenizer the
// assembled pipeline encodes with: runs of word characters and
// runs of punctuation, whitespace dropped.
//
//   "Hello, world!"  →  ["Hello", ",", "world", "!"]
//
// Reserved ids:  0 = <pad>   1 = <unk>

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer};

use crate::domain::traits::TextTokenizer;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;

const RESERVED: usize = 2;

pub struct WordTokenizer {
    inner: Tokenizer,
    vocab: HashMap<String, u32>,
}

impl WordTokenizer {
    /// Count words over `texts` and keep all of them, or only the
    /// `max_vocab_size - 2` most frequent when a cap is given
    /// (ties broken alphabetically so the vocabulary is deterministic).
    /// A cap below 2 cannot hold the reserved tokens and is rejected.
    pub fn build<S: AsRef<str>>(texts: &[S], max_vocab_size: Option<usize>) -> Result<Self> {
        if let Some(cap) = max_vocab_size {
            if cap < RESERVED {
                bail!("max_vocab_size {cap} leaves no room for {PAD_TOKEN} and {UNK_TOKEN}");
            }
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in pre_tokenize(text.as_ref())? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(cap) = max_vocab_size {
            words.truncate(cap - RESERVED);
        }

        let mut vocab: HashMap<String, u32> = HashMap::with_capacity(words.len() + RESERVED);
        vocab.insert(PAD_TOKEN.to_string(), PAD_ID);
        vocab.insert(UNK_TOKEN.to_string(), UNK_ID);
        for (id, (word, _)) in (RESERVED as u32..).zip(&words) {
            vocab.insert(word.clone(), id);
        }

        let inner = Tokenizer::from_str(&tokenizer_json(&vocab).to_string())
            .map_err(|e| anyhow!("Cannot assemble word-level tokenizer: {e}"))?;

        tracing::debug!("Word tokenizer built with {} entries", vocab.len());
        Ok(Self { inner, vocab })
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id(token).is_some()
    }
}

impl TextTokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("Cannot encode text: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> String {
        let bound = self.vocab_size() as u32;
        let ids: Vec<u32> = ids.iter().map(|&id| if id < bound { id } else { UNK_ID }).collect();
        self.inner.decode(&ids, false).unwrap_or_else(|e| {
            tracing::warn!("Cannot decode ids: {e}");
            String::new()
        })
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

/// Split text exactly as the encoding pipeline does before vocabulary lookup.
pub fn pre_tokenize(text: &str) -> Result<Vec<String>> {
    let mut pretokenized = PreTokenizedString::from(text);
    Whitespace::default()
        .pre_tokenize(&mut pretokenized)
        .map_err(|e| anyhow!("Cannot pre-tokenize text: {e}"))?;
    Ok(pretokenized
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(word, _, _)| word.to_string())
        .collect())
}

// HuggingFace tokenizer JSON for a WordLevel model
fn tokenizer_json(vocab: &HashMap<String, u32>) -> serde_json::Value {
    let special = |id: u32, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [special(PAD_ID, PAD_TOKEN), special(UNK_ID, UNK_TOKEN)],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": UNK_TOKEN
        }
    })
}
