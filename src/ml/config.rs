// ============================================================
// Layer 5 — Transformer Configuration
// ============================================================
// One immutable snapshot of the architecture hyperparameters.
// Every module reads it at construction time only, so changing
// a config after a model is built has no effect on that model:
// a new experiment variant means a new config and fresh models.

use burn::config::Config;

use crate::ml::error::{ModelError, ModelResult};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TransformerConfig {
    /// Number of independent sequences processed in parallel
    #[config(default = 16)]
    pub batch_size: usize,

    /// Maximum context length (block length)
    #[config(default = 32)]
    pub block_size: usize,

    /// Embedding width `d`
    #[config(default = 64)]
    pub n_embd: usize,

    /// Attention heads `h`; `n_embd` must be divisible by it
    #[config(default = 2)]
    pub n_head: usize,

    /// Number of stacked transformer blocks `L`
    #[config(default = 4)]
    pub n_layer: usize,

    /// Vocabulary size `V`, taken from the tokenizer
    #[config(default = 5755)]
    pub vocab_size: usize,

    /// Hidden width of the classification head
    #[config(default = 100)]
    pub n_hidden: usize,

    /// Number of output classes of the classification head
    #[config(default = 3)]
    pub n_output: usize,

    /// Dropout probability on embeddings, attention and residual paths
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl TransformerConfig {
    /// Width of a single attention head (`d / h`).
    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }

    /// Reject hyperparameters that cannot build a model.
    pub fn validate(&self) -> ModelResult<()> {
        if self.n_head == 0 || self.n_embd % self.n_head != 0 {
            return Err(ModelError::ConfigMismatch(format!(
                "n_embd ({}) must be divisible by n_head ({})",
                self.n_embd, self.n_head
            )));
        }
        let positive = [
            ("block_size", self.block_size),
            ("n_embd", self.n_embd),
            ("n_layer", self.n_layer),
            ("vocab_size", self.vocab_size),
            ("n_hidden", self.n_hidden),
            ("n_output", self.n_output),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ModelError::ConfigMismatch(format!("{name} must be positive")));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::ConfigMismatch(format!(
                "dropout ({}) must be in [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Inputs longer than the block length are rejected, not truncated.
pub fn check_length(len: usize, block_size: usize) -> ModelResult<()> {
    if len == 0 {
        return Err(ModelError::EmptySequence);
    }
    if len > block_size {
        return Err(ModelError::LengthViolation { len, block_size });
    }
    Ok(())
}
