// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Subcommands and their flags. Each argument struct converts
// into the matching application run config, so the application
// layer never sees clap types.

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    classification_use_case::ClassificationRunConfig,
    language_model_use_case::LanguageModelRunConfig,
};
use crate::ml::positional::PositionalMode;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the encoder to tell the three speakers apart
    Classify(ClassifyArgs),

    /// Train the decoder as a language model and report perplexity
    LanguageModel(LanguageModelArgs),

    /// Classifier and language model without positions, then with distance bias
    Ablation,

    /// Deeper classifier with a capped vocabulary and step learning-rate decay
    Explore,
}

/// Tensor backend used for training.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// WGPU (GPU, falls back to whatever adapter is available)
    Wgpu,
    /// ndarray on the CPU
    Cpu,
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Maximum context length; longer speeches are truncated, shorter ones padded
    #[arg(long, default_value_t = 32)]
    pub block_size: usize,

    /// Embedding width
    #[arg(long, default_value_t = 64)]
    pub n_embd: usize,

    /// Attention heads; n_embd must be divisible by it
    #[arg(long, default_value_t = 2)]
    pub n_head: usize,

    /// Stacked transformer blocks
    #[arg(long, default_value_t = 4)]
    pub n_layer: usize,

    /// Hidden width of the classification head
    #[arg(long, default_value_t = 100)]
    pub n_hidden: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, default_value_t = 15)]
    pub epochs: usize,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// absolute, none or attention-bias
    #[arg(long, default_value = "absolute")]
    pub positional: PositionalMode,

    /// Keep only this many vocabulary entries (including <pad> and <unk>)
    #[arg(long)]
    pub max_vocab_size: Option<usize>,

    /// Multiply the learning rate by --lr-gamma every this many epochs
    #[arg(long)]
    pub lr_step_size: Option<usize>,

    #[arg(long, default_value_t = 1.0)]
    pub lr_gamma: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl ClassifyArgs {
    pub fn into_config(self, data_dir: String, metrics_dir: Option<String>, maps_dir: Option<String>) -> ClassificationRunConfig {
        ClassificationRunConfig {
            data_dir,
            batch_size:     self.batch_size,
            block_size:     self.block_size,
            n_embd:         self.n_embd,
            n_head:         self.n_head,
            n_layer:        self.n_layer,
            n_hidden:       self.n_hidden,
            n_output:       3,
            dropout:        self.dropout,
            epochs:         self.epochs,
            learning_rate:  self.lr,
            lr_step_size:   self.lr_step_size,
            lr_gamma:       self.lr_gamma,
            max_vocab_size: self.max_vocab_size,
            positional:     self.positional,
            seed:           self.seed,
            metrics_dir,
            maps_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct LanguageModelArgs {
    #[arg(long, default_value_t = 32)]
    pub block_size: usize,

    #[arg(long, default_value_t = 64)]
    pub n_embd: usize,

    #[arg(long, default_value_t = 2)]
    pub n_head: usize,

    #[arg(long, default_value_t = 4)]
    pub n_layer: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// Stop after this many training batches
    #[arg(long, default_value_t = 500)]
    pub max_iters: usize,

    /// Report perplexity every this many iterations (and at the first)
    #[arg(long, default_value_t = 100)]
    pub eval_interval: usize,

    /// Batches per corpus when estimating perplexity
    #[arg(long, default_value_t = 200)]
    pub eval_iters: usize,

    /// absolute, none or attention-bias
    #[arg(long, default_value = "absolute")]
    pub positional: PositionalMode,

    #[arg(long)]
    pub max_vocab_size: Option<usize>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl LanguageModelArgs {
    pub fn into_config(self, data_dir: String, metrics_dir: Option<String>, maps_dir: Option<String>) -> LanguageModelRunConfig {
        LanguageModelRunConfig {
            data_dir,
            batch_size:     self.batch_size,
            block_size:     self.block_size,
            n_embd:         self.n_embd,
            n_head:         self.n_head,
            n_layer:        self.n_layer,
            dropout:        self.dropout,
            learning_rate:  self.lr,
            max_iters:      self.max_iters,
            eval_interval:  self.eval_interval,
            eval_iters:     self.eval_iters,
            max_vocab_size: self.max_vocab_size,
            positional:     self.positional,
            seed:           self.seed,
            metrics_dir,
            maps_dir,
        }
    }
}
