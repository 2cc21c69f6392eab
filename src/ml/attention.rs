// ============================================================
// Layer 5 — Multi-Head Self-Attention
// ============================================================
// softmax(Q Kᵀ / sqrt(d/h) + bias + mask) · V, per head.
//
// burn ships a MultiHeadAttention module, but it only accepts
// boolean masks. The distance-bias positional mode needs an
// additive bias on the logits, so attention is written out here
// with plain tensor ops.
//
// Masking uses a large finite sentinel instead of -inf: the
// softmax still maps masked logits to exactly 0, and no
// (-inf) - (-inf) = NaN can appear in a fully masked row.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

use crate::ml::config::TransformerConfig;

/// Additive logit for disallowed (future) positions.
pub const MASK_SENTINEL: f32 = -1.0e9;

/// Result of one attention call.
pub struct AttentionOutput<B: Backend> {
    /// Mixed values, `[batch, seq, d]`
    pub context: Tensor<B, 3>,
    /// Post-softmax weights, `[batch, heads, seq, seq]`; every row sums to 1
    pub weights: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct MultiHeadSelfAttention<B: Backend> {
    query:    Linear<B>,
    key:      Linear<B>,
    value:    Linear<B>,
    output:   Linear<B>,
    dropout:  Dropout,
    n_head:   usize,
    head_dim: usize,
}

impl<B: Backend> MultiHeadSelfAttention<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        let d = config.n_embd;
        Self {
            query:    LinearConfig::new(d, d).with_bias(false).init(device),
            key:      LinearConfig::new(d, d).with_bias(false).init(device),
            value:    LinearConfig::new(d, d).with_bias(false).init(device),
            output:   LinearConfig::new(d, d).init(device),
            dropout:  DropoutConfig::new(config.dropout).init(),
            n_head:   config.n_head,
            head_dim: config.head_dim(),
        }
    }

    /// x: `[batch, seq, d]`.
    ///
    /// `causal_mask` is `[seq, seq]` with `true` on positions a query may
    /// not see; `bias` is `[heads, seq, seq]`. Both are optional and add up
    /// when supplied together.
    pub fn forward(
        &self,
        x:           Tensor<B, 3>,
        causal_mask: Option<Tensor<B, 2, Bool>>,
        bias:        Option<Tensor<B, 3>>,
    ) -> AttentionOutput<B> {
        let [batch_size, seq_len, d_model] = x.dims();
        let scores_shape = [batch_size, self.n_head, seq_len, seq_len];

        let q = self.split_heads(self.query.forward(x.clone()));
        let k = self.split_heads(self.key.forward(x.clone()));
        let v = self.split_heads(self.value.forward(x));

        let mut scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((self.head_dim as f64).sqrt());

        if let Some(bias) = bias {
            scores = scores + bias.unsqueeze::<4>().expand(scores_shape);
        }
        if let Some(mask) = causal_mask {
            scores = scores + additive_mask(mask).unsqueeze::<4>().expand(scores_shape);
        }

        let weights = softmax(scores, 3);
        let context = self
            .dropout
            .forward(weights.clone())
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch_size, seq_len, d_model]);

        AttentionOutput { context: self.output.forward(context), weights }
    }

    // [batch, seq, d] → [batch, heads, seq, head_dim]
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, seq_len, _] = x.dims();
        x.reshape([batch_size, seq_len, self.n_head, self.head_dim])
            .swap_dims(1, 2)
    }
}

/// Boolean causal mask: `mask[i][j]` is true when key `j` lies to the
/// right of query `i` and must be hidden.
pub fn causal_mask<B: Backend>(seq_len: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    let values: Vec<bool> = (0..seq_len)
        .flat_map(|i| (0..seq_len).map(move |j| j > i))
        .collect();
    Tensor::from_data(TensorData::new(values, [seq_len, seq_len]), device)
}

fn additive_mask<B: Backend>(mask: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
    let [rows, cols] = mask.dims();
    Tensor::zeros([rows, cols], &mask.device()).mask_fill(mask, MASK_SENTINEL)
}
