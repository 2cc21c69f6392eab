// ============================================================
// Layer 5 — Positional Signal Providers
// ============================================================
// Self-attention is permutation-equivariant, so order has to be
// injected from outside. Three interchangeable strategies:
//
//   Absolute       learned table[position] added to the token
//                  embedding before the first block
//   Disabled       no positional contribution at all (ablation)
//   AttentionBias  per-head linear distance penalty
//                  -slope_h * |i - j| added to the raw attention
//                  logits before the softmax
//
// The strategy is picked once when the model is built; the
// forward pass only asks "give me your embedding term" and
// "give me your attention bias".

use std::fmt;
use std::str::FromStr;

use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::ml::config::TransformerConfig;

/// Which positional strategy a model instance uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionalMode {
    Absolute,
    #[serde(rename = "none")]
    Disabled,
    AttentionBias,
}

impl PositionalMode {
    pub const ALL: [PositionalMode; 3] = [
        PositionalMode::Absolute,
        PositionalMode::Disabled,
        PositionalMode::AttentionBias,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionalMode::Absolute => "absolute",
            PositionalMode::Disabled => "none",
            PositionalMode::AttentionBias => "attention-bias",
        }
    }
}

impl fmt::Display for PositionalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "absolute" => Ok(PositionalMode::Absolute),
            "none" | "nope" => Ok(PositionalMode::Disabled),
            "attention-bias" | "alibi" => Ok(PositionalMode::AttentionBias),
            other => Err(format!(
                "unknown positional mode '{other}' (expected absolute, none or attention-bias)"
            )),
        }
    }
}

/// Fixed per-head slopes for the distance bias: a geometric sequence
/// 2^(-8/h), 2^(-16/h), ..., 2^(-8) so every head decays at its own rate.
pub fn attention_bias_slopes(n_head: usize) -> Vec<f32> {
    (1..=n_head)
        .map(|k| 2f32.powf(-8.0 * k as f32 / n_head as f32))
        .collect()
}

/// Build the `[heads, seq_len, seq_len]` additive bias
/// `bias[h][i][j] = -slope_h * |i - j|`.
pub fn distance_bias<B: Backend>(
    slopes:  &[f32],
    seq_len: usize,
    device:  &B::Device,
) -> Tensor<B, 3> {
    let mut values = Vec::with_capacity(slopes.len() * seq_len * seq_len);
    for &slope in slopes {
        for i in 0..seq_len {
            for j in 0..seq_len {
                values.push(-slope * i.abs_diff(j) as f32);
            }
        }
    }
    Tensor::from_data(TensorData::new(values, [slopes.len(), seq_len, seq_len]), device)
}

/// The realised positional strategy of one model.
///
/// Exactly one of the two fields is active: a learned table for
/// `Absolute`, a head count for `AttentionBias`, neither for `Disabled`.
#[derive(Module, Debug)]
pub struct PositionalSignal<B: Backend> {
    table:     Option<Embedding<B>>,
    /// Heads receiving a distance bias (0 = no bias)
    bias_heads: usize,
}

impl<B: Backend> PositionalSignal<B> {
    pub fn new(mode: PositionalMode, config: &TransformerConfig, device: &B::Device) -> Self {
        match mode {
            PositionalMode::Absolute => Self {
                table: Some(EmbeddingConfig::new(config.block_size, config.n_embd).init(device)),
                bias_heads: 0,
            },
            PositionalMode::Disabled => Self { table: None, bias_heads: 0 },
            PositionalMode::AttentionBias => Self { table: None, bias_heads: config.n_head },
        }
    }

    pub fn mode(&self) -> PositionalMode {
        if self.table.is_some() {
            PositionalMode::Absolute
        } else if self.bias_heads > 0 {
            PositionalMode::AttentionBias
        } else {
            PositionalMode::Disabled
        }
    }

    /// Add the embedding-stage contribution to `[batch, seq, d]` token embeddings.
    /// Callers guarantee `seq <= block_size`.
    pub fn embed(&self, tokens: Tensor<B, 3>) -> Tensor<B, 3> {
        match &self.table {
            Some(table) => {
                let [batch_size, seq_len, _] = tokens.dims();
                let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tokens.device())
                    .unsqueeze::<2>()
                    .expand([batch_size, seq_len]);
                tokens + table.forward(positions)
            }
            None => tokens,
        }
    }

    /// The attention-logit contribution, `[heads, seq, seq]`, if any.
    pub fn attention_bias(&self, seq_len: usize, device: &B::Device) -> Option<Tensor<B, 3>> {
        (self.bias_heads > 0)
            .then(|| distance_bias(&attention_bias_slopes(self.bias_heads), seq_len, device))
    }
}
