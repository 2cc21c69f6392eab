// ============================================================
// Layer 5 — Feed-Forward Sublayer and Transformer Block
// ============================================================
// Pre-norm residual block:
//
//   x = x + Attention(LayerNorm(x))
//   x = x + FeedForward(LayerNorm(x))
//
// Whether the block is causal is fixed when the stack is built
// (false for the encoder, true for the decoder).

use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::gelu,
};

use crate::ml::attention::{causal_mask, MultiHeadSelfAttention};
use crate::ml::config::TransformerConfig;

/// Position-wise `d → 4d → d` projection with GELU in between.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    expand:  Linear<B>,
    project: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        let hidden = 4 * config.n_embd;
        Self {
            expand:  LinearConfig::new(config.n_embd, hidden).init(device),
            project: LinearConfig::new(hidden, config.n_embd).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
        }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let h = gelu(self.expand.forward(x));
        self.dropout.forward(self.project.forward(h))
    }
}

/// Output of one block: new hidden states plus this layer's attention map.
pub struct BlockOutput<B: Backend> {
    pub hidden:    Tensor<B, 3>,
    pub attention: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    attention:         MultiHeadSelfAttention<B>,
    norm_attention:    LayerNorm<B>,
    feed_forward:      FeedForward<B>,
    norm_feed_forward: LayerNorm<B>,
    dropout:           Dropout,
    causal:            bool,
}

impl<B: Backend> TransformerBlock<B> {
    pub fn new(config: &TransformerConfig, causal: bool, device: &B::Device) -> Self {
        Self {
            attention:         MultiHeadSelfAttention::new(config, device),
            norm_attention:    LayerNormConfig::new(config.n_embd).init(device),
            feed_forward:      FeedForward::new(config, device),
            norm_feed_forward: LayerNormConfig::new(config.n_embd).init(device),
            dropout:           DropoutConfig::new(config.dropout).init(),
            causal,
        }
    }

    /// x: `[batch, seq, d]`; `bias`: optional `[heads, seq, seq]` logit bias.
    pub fn forward(&self, x: Tensor<B, 3>, bias: Option<Tensor<B, 3>>) -> BlockOutput<B> {
        let [_, seq_len, _] = x.dims();
        let mask = self.causal.then(|| causal_mask::<B>(seq_len, &x.device()));

        let attended = self
            .attention
            .forward(self.norm_attention.forward(x.clone()), mask, bias);
        let x = x + self.dropout.forward(attended.context);

        let transformed = self.feed_forward.forward(self.norm_feed_forward.forward(x.clone()));
        let hidden = x + transformed;

        BlockOutput { hidden, attention: attended.weights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn config() -> TransformerConfig {
        TransformerConfig::new().with_n_embd(16).with_n_head(4)
    }

    #[test]
    fn test_block_preserves_shape() {
        let device = Default::default();
        let block = TransformerBlock::<TestBackend>::new(&config(), false, &device);
        let x = Tensor::random([2, 5, 16], Distribution::Normal(0.0, 1.0), &device);
        let out = block.forward(x, None);
        assert_eq!(out.hidden.dims(), [2, 5, 16]);
        assert_eq!(out.attention.dims(), [2, 4, 5, 5]);
        assert!(!block.causal);
    }

    #[test]
    fn test_feed_forward_is_position_wise() {
        let device = Default::default();
        let ff = FeedForward::<TestBackend>::new(&config(), &device);
        let x = Tensor::<TestBackend, 3>::random([1, 4, 16], Distribution::Normal(0.0, 1.0), &device);

        // perturb only the last position
        let mut changed = x.clone().into_data().to_vec::<f32>().unwrap();
        for v in &mut changed[48..] {
            *v += 3.0;
        }
        let changed = Tensor::<TestBackend, 3>::from_data(TensorData::new(changed, [1, 4, 16]), &device);

        let a = ff.forward(x).into_data().to_vec::<f32>().unwrap();
        let b = ff.forward(changed).into_data().to_vec::<f32>().unwrap();
        for (left, right) in a[..48].iter().zip(&b[..48]) {
            assert!((left - right).abs() < 1e-6);
        }
        assert_ne!(a[48..], b[48..]);
    }

    #[test]
    fn test_causal_block_ignores_future_tokens() {
        let device = Default::default();
        let block = TransformerBlock::<TestBackend>::new(&config(), true, &device);
        assert!(block.causal);

        let x = Tensor::<TestBackend, 3>::random([1, 4, 16], Distribution::Normal(0.0, 1.0), &device);
        let mut changed = x.clone().into_data().to_vec::<f32>().unwrap();
        for v in &mut changed[48..] {
            *v -= 2.0;
        }
        let changed = Tensor::<TestBackend, 3>::from_data(TensorData::new(changed, [1, 4, 16]), &device);

        let a = block.forward(x, None).hidden.into_data().to_vec::<f32>().unwrap();
        let b = block.forward(changed, None).hidden.into_data().to_vec::<f32>().unwrap();
        // earlier positions cannot see the perturbed last token
        for (left, right) in a[..48].iter().zip(&b[..48]) {
            assert!((left - right).abs() < 1e-5);
        }
    }
}
