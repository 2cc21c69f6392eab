// ============================================================
// Layer 2 — LanguageModelUseCase
// ============================================================
// Causal language-model run, in order:
//
//   Step 1: Build the word vocabulary         (Layer 4 - data)
//   Step 2: Encode train + held-out corpora   (Layer 4 - data)
//   Step 3: Size the decoder to the vocab     (Layer 5 - ml)
//   Step 4: Train with periodic perplexity    (Layer 5 - ml)
//   Step 5: Attention sanity check            (Layer 5 - ml)
//   Step 6: Heat maps, if requested           (Layer 6 - infra)

use anyhow::Result;
use burn::{
    module::{AutodiffModule, Module},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::{build_tokenizer, write_attention_maps};
use crate::data::{
    dataset::LanguageModelingDataset,
    loader::{load_text, SpeechCorpus},
};
use crate::domain::attention_map::AttentionMap;
use crate::domain::traits::TextTokenizer;
use crate::infra::metrics::{MetricsLogger, PerplexityReport};
use crate::ml::{
    config::TransformerConfig,
    introspection::sanity_check,
    model::DecoderModel,
    positional::PositionalMode,
    trainer::{train_language_model, LanguageModelTrainingConfig},
};

pub const DECODER_SANITY_SENTENCE: &str =
    "It is costly and politically difficult to continue this conflict.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModelRunConfig {
    pub data_dir:       String,
    pub batch_size:     usize,
    pub block_size:     usize,
    pub n_embd:         usize,
    pub n_head:         usize,
    pub n_layer:        usize,
    pub dropout:        f64,
    pub learning_rate:  f64,
    pub max_iters:      usize,
    pub eval_interval:  usize,
    pub eval_iters:     usize,
    pub max_vocab_size: Option<usize>,
    pub positional:     PositionalMode,
    pub seed:           u64,
    pub metrics_dir:    Option<String>,
    pub maps_dir:       Option<String>,
}

impl Default for LanguageModelRunConfig {
    fn default() -> Self {
        Self {
            data_dir:       "speechesdataset".to_string(),
            batch_size:     16,
            block_size:     32,
            n_embd:         64,
            n_head:         2,
            n_layer:        4,
            dropout:        0.0,
            learning_rate:  1e-3,
            max_iters:      500,
            eval_interval:  100,
            eval_iters:     200,
            max_vocab_size: None,
            positional:     PositionalMode::Absolute,
            seed:           42,
            metrics_dir:    None,
            maps_dir:       None,
        }
    }
}

impl LanguageModelRunConfig {
    pub fn model_config(&self, vocab_size: usize) -> TransformerConfig {
        TransformerConfig::new()
            .with_batch_size(self.batch_size)
            .with_block_size(self.block_size)
            .with_n_embd(self.n_embd)
            .with_n_head(self.n_head)
            .with_n_layer(self.n_layer)
            .with_vocab_size(vocab_size)
            .with_dropout(self.dropout)
    }

    pub fn training_config(&self) -> LanguageModelTrainingConfig {
        LanguageModelTrainingConfig::new()
            .with_max_iters(self.max_iters)
            .with_eval_interval(self.eval_interval)
            .with_eval_iters(self.eval_iters)
            .with_learning_rate(self.learning_rate)
            .with_seed(self.seed)
    }
}

#[derive(Debug, Clone)]
pub struct LanguageModelSummary {
    pub vocab_size:     usize,
    pub parameters:     usize,
    pub reports:        Vec<PerplexityReport>,
    pub attention_maps: Vec<AttentionMap>,
}

impl LanguageModelSummary {
    pub fn final_report(&self) -> Option<&PerplexityReport> {
        self.reports.last()
    }
}

pub struct LanguageModelUseCase {
    config: LanguageModelRunConfig,
}

impl LanguageModelUseCase {
    pub fn new(config: LanguageModelRunConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<LanguageModelSummary> {
        let cfg = &self.config;
        B::seed(cfg.seed);
        let corpus = SpeechCorpus::new(&cfg.data_dir);

        // ── Step 1: Vocabulary ───────────────────────────────────────────────
        println!("Loading data and creating tokenizer ...");
        let tokenizer = build_tokenizer(&corpus, cfg.max_vocab_size)?;
        println!("Vocabulary size is {}", tokenizer.vocab_size());

        // ── Step 2: Sliding-window datasets ──────────────────────────────────
        let train_text = load_text(corpus.train_language_model())?;
        let train_set  = LanguageModelingDataset::from_text(&tokenizer, &train_text, cfg.block_size)?;
        tracing::info!("Training text: {} tokens", train_set.token_count());

        let mut held_out = Vec::new();
        for (name, path) in corpus.test_language_model() {
            let text = load_text(&path)?;
            let dataset = LanguageModelingDataset::from_text(&tokenizer, &text, cfg.block_size)?;
            tracing::info!("Held-out '{}': {} tokens", name, dataset.token_count());
            held_out.push((name.to_string(), dataset));
        }

        // ── Step 3: Model sized to this tokenizer ────────────────────────────
        let model_config = cfg.model_config(tokenizer.vocab_size());
        let model = DecoderModel::<B>::new(&model_config, cfg.positional, device)?;
        let parameters = model.num_params();
        println!("{} M parameters", parameters as f64 / 1e6);
        tracing::info!(
            "Decoder ready: {} layers, {} heads, d={}, positional={}",
            cfg.n_layer, cfg.n_head, cfg.n_embd, cfg.positional
        );

        // ── Step 4: Train ────────────────────────────────────────────────────
        let metrics = cfg
            .metrics_dir
            .as_ref()
            .map(|dir| MetricsLogger::new(dir, &format!("language_model_{}.csv", cfg.positional)))
            .transpose()?;
        let (model, reports) = train_language_model(
            model,
            &model_config,
            &cfg.training_config(),
            train_set,
            held_out,
            device,
            metrics.as_ref(),
        )?;

        // ── Step 5 / 6: Attention introspection ──────────────────────────────
        let attention_maps = sanity_check(
            &model.valid(),
            &tokenizer,
            DECODER_SANITY_SENTENCE,
            device,
        )?;
        if let Some(dir) = &cfg.maps_dir {
            write_attention_maps(dir, &format!("language_model_{}", cfg.positional), &attention_maps)?;
        }

        Ok(LanguageModelSummary {
            vocab_size: tokenizer.vocab_size(),
            parameters,
            reports,
            attention_maps,
        })
    }
}
