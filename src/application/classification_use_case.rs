// ============================================================
// Layer 2 — ClassificationUseCase
// ============================================================
// Speaker classification run, in order:
//
//   Step 1: Build the word vocabulary      (Layer 4 - data)
//   Step 2: Load train/test speeches       (Layer 4 - data)
//   Step 3: Size the model to the vocab    (Layer 5 - ml)
//   Step 4: Train the encoder              (Layer 5 - ml)
//   Step 5: Attention sanity check         (Layer 5 - ml)
//   Step 6: Heat maps, if requested        (Layer 6 - infra)

use anyhow::Result;
use burn::{
    module::{AutodiffModule, Module},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::{build_tokenizer, write_attention_maps};
use crate::data::{
    dataset::ClassificationDataset,
    loader::{load_labeled_speeches, SpeechCorpus},
};
use crate::domain::attention_map::AttentionMap;
use crate::domain::traits::TextTokenizer;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::{
    config::TransformerConfig,
    introspection::sanity_check,
    model::EncoderModel,
    positional::PositionalMode,
    trainer::{train_classifier, ClassifierTrainingConfig},
};

pub const CLASSIFIER_SANITY_SENTENCE: &str = "To strengthen our middle class, we must give all our children \
the education they deserve, and all our workers the skills that they need to compete in a global economy.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRunConfig {
    pub data_dir:       String,
    pub batch_size:     usize,
    pub block_size:     usize,
    pub n_embd:         usize,
    pub n_head:         usize,
    pub n_layer:        usize,
    pub n_hidden:       usize,
    pub n_output:       usize,
    pub dropout:        f64,
    pub epochs:         usize,
    pub learning_rate:  f64,
    pub lr_step_size:   Option<usize>,
    pub lr_gamma:       f64,
    pub max_vocab_size: Option<usize>,
    pub positional:     PositionalMode,
    pub seed:           u64,
    pub metrics_dir:    Option<String>,
    pub maps_dir:       Option<String>,
}

impl Default for ClassificationRunConfig {
    fn default() -> Self {
        Self {
            data_dir:       "speechesdataset".to_string(),
            batch_size:     16,
            block_size:     32,
            n_embd:         64,
            n_head:         2,
            n_layer:        4,
            n_hidden:       100,
            n_output:       3,
            dropout:        0.0,
            epochs:         15,
            learning_rate:  1e-3,
            lr_step_size:   None,
            lr_gamma:       1.0,
            max_vocab_size: None,
            positional:     PositionalMode::Absolute,
            seed:           42,
            metrics_dir:    None,
            maps_dir:       None,
        }
    }
}

impl ClassificationRunConfig {
    /// Deeper, wider-context variant with a capped vocabulary and step decay.
    pub fn explore() -> Self {
        Self {
            n_layer:        8,
            n_hidden:       128,
            block_size:     48,
            epochs:         25,
            max_vocab_size: Some(3000),
            lr_step_size:   Some(5),
            lr_gamma:       0.75,
            ..Self::default()
        }
    }

    pub fn model_config(&self, vocab_size: usize) -> TransformerConfig {
        TransformerConfig::new()
            .with_batch_size(self.batch_size)
            .with_block_size(self.block_size)
            .with_n_embd(self.n_embd)
            .with_n_head(self.n_head)
            .with_n_layer(self.n_layer)
            .with_vocab_size(vocab_size)
            .with_n_hidden(self.n_hidden)
            .with_n_output(self.n_output)
            .with_dropout(self.dropout)
    }

    pub fn training_config(&self) -> ClassifierTrainingConfig {
        ClassifierTrainingConfig::new()
            .with_epochs(self.epochs)
            .with_learning_rate(self.learning_rate)
            .with_lr_step_size(self.lr_step_size)
            .with_lr_gamma(self.lr_gamma)
            .with_seed(self.seed)
    }
}

/// What a finished classification run produced.
#[derive(Debug, Clone)]
pub struct ClassificationSummary {
    pub vocab_size:     usize,
    pub parameters:     usize,
    pub history:        Vec<EpochMetrics>,
    pub attention_maps: Vec<AttentionMap>,
}

impl ClassificationSummary {
    pub fn final_test_accuracy(&self) -> Option<f64> {
        self.history.last().map(|m| m.test_accuracy)
    }
}

pub struct ClassificationUseCase {
    config: ClassificationRunConfig,
}

impl ClassificationUseCase {
    pub fn new(config: ClassificationRunConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<ClassificationSummary> {
        let cfg = &self.config;
        B::seed(cfg.seed);
        let corpus = SpeechCorpus::new(&cfg.data_dir);

        // ── Step 1: Vocabulary ───────────────────────────────────────────────
        println!("Loading data and creating tokenizer ...");
        let tokenizer = build_tokenizer(&corpus, cfg.max_vocab_size)?;
        println!("Vocabulary size is {}", tokenizer.vocab_size());

        // ── Step 2: Datasets ─────────────────────────────────────────────────
        let train_speeches = load_labeled_speeches(corpus.train_classification())?;
        let test_speeches  = load_labeled_speeches(corpus.test_classification())?;
        let train_set = ClassificationDataset::from_speeches(&tokenizer, &train_speeches)?;
        let test_set  = ClassificationDataset::from_speeches(&tokenizer, &test_speeches)?;
        tracing::info!("Train class counts: {:?}", train_set.class_counts(cfg.n_output));

        // ── Step 3: Model sized to this tokenizer ────────────────────────────
        let model_config = cfg.model_config(tokenizer.vocab_size());
        let model = EncoderModel::<B>::new(&model_config, cfg.positional, device)?;
        let parameters = model.num_params();
        println!("{} M parameters", parameters as f64 / 1e6);
        tracing::info!(
            "Encoder ready: {} layers, {} heads, d={}, positional={}",
            cfg.n_layer, cfg.n_head, cfg.n_embd, cfg.positional
        );

        // ── Step 4: Train ────────────────────────────────────────────────────
        let metrics = cfg
            .metrics_dir
            .as_ref()
            .map(|dir| MetricsLogger::new(dir, &format!("classifier_{}.csv", cfg.positional)))
            .transpose()?;
        let (model, history) = train_classifier(
            model,
            &model_config,
            &cfg.training_config(),
            train_set,
            test_set,
            device,
            metrics.as_ref(),
        )?;

        // ── Step 5 / 6: Attention introspection ──────────────────────────────
        let attention_maps = sanity_check(
            &model.valid(),
            &tokenizer,
            CLASSIFIER_SANITY_SENTENCE,
            device,
        )?;
        if let Some(dir) = &cfg.maps_dir {
            write_attention_maps(dir, &format!("classifier_{}", cfg.positional), &attention_maps)?;
        }

        Ok(ClassificationSummary {
            vocab_size: tokenizer.vocab_size(),
            parameters,
            history,
            attention_maps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::write_toy_corpus;
    use crate::ml::backend::{cpu_device, CpuBackend};

    #[test]
    fn test_explore_preset() {
        let cfg = ClassificationRunConfig::explore();
        assert_eq!(cfg.n_layer, 8);
        assert_eq!(cfg.block_size, 48);
        assert_eq!(cfg.max_vocab_size, Some(3000));
        let train = cfg.training_config();
        assert_eq!(train.lr_step_size, Some(5));
        assert_eq!(train.lr_gamma, 0.75);
    }

    #[test]
    fn test_model_config_takes_tokenizer_vocab() {
        let cfg = ClassificationRunConfig::default().model_config(1234);
        assert_eq!(cfg.vocab_size, 1234);
        assert_eq!(cfg.n_embd, 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_end_to_end_on_toy_corpus() {
        let dir = write_toy_corpus("classify");
        let maps_dir = dir.join("maps");
        let cfg = ClassificationRunConfig {
            data_dir:    dir.to_string_lossy().into_owned(),
            batch_size:  4,
            block_size:  8,
            n_embd:      16,
            n_layer:     2,
            n_hidden:    8,
            epochs:      2,
            positional:  PositionalMode::AttentionBias,
            maps_dir:    Some(maps_dir.to_string_lossy().into_owned()),
            metrics_dir: Some(dir.join("metrics").to_string_lossy().into_owned()),
            ..ClassificationRunConfig::default()
        };

        let summary = ClassificationUseCase::new(cfg).execute::<CpuBackend>(&cpu_device()).unwrap();
        assert_eq!(summary.history.len(), 2);
        assert!(summary.final_test_accuracy().is_some());
        assert_eq!(summary.attention_maps.len(), 2 * 2);
        assert!(summary.parameters > 0);
        assert!(maps_dir.join("classifier_attention-bias").join("attention_map_L1_H1.png").exists());
        assert!(dir.join("metrics").join("classifier_attention-bias.csv").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
