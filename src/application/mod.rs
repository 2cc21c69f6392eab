// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers into complete experiment runs.
// No model math lives here, only workflow: build the tokenizer,
// load data, size the model, train, inspect.

use anyhow::Result;
use std::path::Path;

use crate::data::{loader::SpeechCorpus, tokenizer::WordTokenizer};
use crate::domain::attention_map::AttentionMap;
use crate::infra::heatmap::HeatmapWriter;

/// Speaker classification with the encoder
pub mod classification_use_case;

/// Causal language modeling with the decoder
pub mod language_model_use_case;

/// Ablation and exploration suites
pub mod experiments;

/// Vocabulary from every non-test file of the corpus.
pub(crate) fn build_tokenizer(corpus: &SpeechCorpus, max_vocab_size: Option<usize>) -> Result<WordTokenizer> {
    let texts = corpus.vocabulary_texts()?;
    tracing::info!(
        "Building vocabulary from {} files in '{}' (cap: {:?})",
        texts.len(),
        corpus.root().display(),
        max_vocab_size
    );
    WordTokenizer::build(&texts, max_vocab_size)
}

/// PNGs plus a JSON dump under `<maps_dir>/<run_name>/`.
pub(crate) fn write_attention_maps(maps_dir: &str, run_name: &str, maps: &[AttentionMap]) -> Result<()> {
    let writer = HeatmapWriter::new(Path::new(maps_dir).join(run_name))?;
    writer.write_all(maps)?;
    writer.write_json(maps)?;
    Ok(())
}
