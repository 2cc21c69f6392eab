// ============================================================
// Layer 5 — Encoder / Decoder Models
// ============================================================
// Both models share one backbone:
//
//   token ids ─► embedding ─► positional signal ─► L blocks ─► LayerNorm
//
// and differ only in masking and head:
//
//   EncoderModel  non-causal blocks, mean pooling over positions,
//                 d → n_hidden → ReLU → n_output classifier
//   DecoderModel  causal blocks, per-position projection to the
//                 vocabulary (next-token logits)
//
// Every forward returns a ModelOutput {logits, loss?, attention maps}.

use burn::{
    nn::{
        loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::block::TransformerBlock;
use crate::ml::config::{check_length, TransformerConfig};
use crate::ml::error::{ModelError, ModelResult};
use crate::ml::positional::{PositionalMode, PositionalSignal};

/// Logits, optional loss and one `[batch, heads, seq, seq]` attention map per layer.
pub struct ModelOutput<B: Backend, const D: usize> {
    pub logits:         Tensor<B, D>,
    pub loss:           Option<Tensor<B, 1>>,
    pub attention_maps: Vec<Tensor<B, 4>>,
}

/// Encoder output: logits are `[batch, n_output]`.
pub type ClassifierOutput<B> = ModelOutput<B, 2>;

/// Decoder output: logits are `[batch, seq, vocab]`.
pub type LanguageModelOutput<B> = ModelOutput<B, 3>;

/// Hidden states after the final LayerNorm, plus per-layer attention.
pub struct StackOutput<B: Backend> {
    pub hidden:         Tensor<B, 3>,
    pub attention_maps: Vec<Tensor<B, 4>>,
}

/// Capabilities shared by both models, used by the introspection utility.
pub trait SequenceModel<B: Backend> {
    fn block_size(&self) -> usize;

    fn positional_mode(&self) -> PositionalMode;

    /// Number of token ids the embedding table accepts.
    fn vocab_size(&self) -> usize;

    /// Attention maps of every layer for a `[batch, seq]` batch of token ids.
    fn attention_maps(&self, tokens: Tensor<B, 2, Int>) -> ModelResult<Vec<Tensor<B, 4>>>;
}

// ─── Shared backbone ─────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct TransformerStack<B: Backend> {
    token_embedding: Embedding<B>,
    positional:      PositionalSignal<B>,
    blocks:          Vec<TransformerBlock<B>>,
    final_norm:      LayerNorm<B>,
    dropout:         Dropout,
    block_size:      usize,
    vocab_size:      usize,
}

impl<B: Backend> TransformerStack<B> {
    pub fn new(
        config: &TransformerConfig,
        mode:   PositionalMode,
        causal: bool,
        device: &B::Device,
    ) -> ModelResult<Self> {
        config.validate()?;
        let blocks = (0..config.n_layer)
            .map(|_| TransformerBlock::new(config, causal, device))
            .collect();
        Ok(Self {
            token_embedding: EmbeddingConfig::new(config.vocab_size, config.n_embd).init(device),
            positional:      PositionalSignal::new(mode, config, device),
            blocks,
            final_norm:      LayerNormConfig::new(config.n_embd).init(device),
            dropout:         DropoutConfig::new(config.dropout).init(),
            block_size:      config.block_size,
            vocab_size:      config.vocab_size,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn positional_mode(&self) -> PositionalMode {
        self.positional.mode()
    }

    /// tokens: `[batch, seq]` with `0 < seq <= block_size`.
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> ModelResult<StackOutput<B>> {
        let [_, seq_len] = tokens.dims();
        check_length(seq_len, self.block_size)?;
        let device = tokens.device();

        let x = self.positional.embed(self.token_embedding.forward(tokens));
        let mut x = self.dropout.forward(x);

        // the bias depends only on seq_len, so it is built once per pass
        let bias = self.positional.attention_bias(seq_len, &device);

        let mut attention_maps = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let out = block.forward(x, bias.clone());
            x = out.hidden;
            attention_maps.push(out.attention);
        }

        Ok(StackOutput { hidden: self.final_norm.forward(x), attention_maps })
    }
}

// ─── Encoder (classification) ────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct EncoderModel<B: Backend> {
    stack:             TransformerStack<B>,
    classifier_hidden: Linear<B>,
    classifier_output: Linear<B>,
}

impl<B: Backend> EncoderModel<B> {
    pub fn new(config: &TransformerConfig, mode: PositionalMode, device: &B::Device) -> ModelResult<Self> {
        Ok(Self {
            stack:             TransformerStack::new(config, mode, false, device)?,
            classifier_hidden: LinearConfig::new(config.n_embd, config.n_hidden).init(device),
            classifier_output: LinearConfig::new(config.n_hidden, config.n_output).init(device),
        })
    }

    /// Per-position representations `[batch, seq, d]` before pooling.
    pub fn encode(&self, tokens: Tensor<B, 2, Int>) -> ModelResult<StackOutput<B>> {
        self.stack.forward(tokens)
    }

    /// tokens: `[batch, seq]`, labels: `[batch]` class ids.
    /// logits: `[batch, n_output]`; loss is present iff labels were given.
    pub fn forward(
        &self,
        tokens: Tensor<B, 2, Int>,
        labels: Option<Tensor<B, 1, Int>>,
    ) -> ModelResult<ClassifierOutput<B>> {
        let [batch_size, _] = tokens.dims();
        if let Some(labels) = &labels {
            check_shape(&[batch_size], &labels.dims())?;
        }

        let StackOutput { hidden, attention_maps } = self.stack.forward(tokens)?;
        let [_, _, d_model] = hidden.dims();

        // mean pooling over the sequence
        let pooled = hidden.mean_dim(1).reshape([batch_size, d_model]);
        let logits = self
            .classifier_output
            .forward(relu(self.classifier_hidden.forward(pooled)));

        let loss = labels.map(|labels| classification_loss(logits.clone(), labels));
        Ok(ModelOutput { logits, loss, attention_maps })
    }
}

impl<B: Backend> SequenceModel<B> for EncoderModel<B> {
    fn block_size(&self) -> usize {
        self.stack.block_size()
    }

    fn positional_mode(&self) -> PositionalMode {
        self.stack.positional_mode()
    }

    fn vocab_size(&self) -> usize {
        self.stack.vocab_size()
    }

    fn attention_maps(&self, tokens: Tensor<B, 2, Int>) -> ModelResult<Vec<Tensor<B, 4>>> {
        Ok(self.stack.forward(tokens)?.attention_maps)
    }
}

// ─── Decoder (language modeling) ─────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct DecoderModel<B: Backend> {
    stack:   TransformerStack<B>,
    lm_head: Linear<B>,
}

impl<B: Backend> DecoderModel<B> {
    pub fn new(config: &TransformerConfig, mode: PositionalMode, device: &B::Device) -> ModelResult<Self> {
        Ok(Self {
            stack:   TransformerStack::new(config, mode, true, device)?,
            lm_head: LinearConfig::new(config.n_embd, config.vocab_size).init(device),
        })
    }

    /// tokens: `[batch, seq]`; targets: the same sequences shifted left by one.
    /// logits: `[batch, seq, vocab]`; loss is the mean next-token cross-entropy.
    pub fn forward(
        &self,
        tokens:  Tensor<B, 2, Int>,
        targets: Option<Tensor<B, 2, Int>>,
    ) -> ModelResult<LanguageModelOutput<B>> {
        if let Some(targets) = &targets {
            check_shape(&tokens.dims(), &targets.dims())?;
        }

        let StackOutput { hidden, attention_maps } = self.stack.forward(tokens)?;
        let logits = self.lm_head.forward(hidden);

        let loss = targets.map(|targets| language_model_loss(logits.clone(), targets));
        Ok(ModelOutput { logits, loss, attention_maps })
    }
}

impl<B: Backend> SequenceModel<B> for DecoderModel<B> {
    fn block_size(&self) -> usize {
        self.stack.block_size()
    }

    fn positional_mode(&self) -> PositionalMode {
        self.stack.positional_mode()
    }

    fn vocab_size(&self) -> usize {
        self.stack.vocab_size()
    }

    fn attention_maps(&self, tokens: Tensor<B, 2, Int>) -> ModelResult<Vec<Tensor<B, 4>>> {
        Ok(self.stack.forward(tokens)?.attention_maps)
    }
}

// ─── Losses ──────────────────────────────────────────────────────────────────

/// Mean cross-entropy of `[batch, classes]` logits against `[batch]` labels.
pub fn classification_loss<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}

/// Mean next-token cross-entropy over every position of every sequence.
pub fn language_model_loss<B: Backend>(logits: Tensor<B, 3>, targets: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab_size] = logits.dims();
    let device = logits.device();
    CrossEntropyLossConfig::new().init(&device).forward(
        logits.reshape([batch_size * seq_len, vocab_size]),
        targets.reshape([batch_size * seq_len]),
    )
}

/// Perplexity from a mean per-token cross-entropy.
pub fn perplexity(mean_loss: f64) -> f64 {
    mean_loss.exp()
}

fn check_shape(expected: &[usize], actual: &[usize]) -> ModelResult<()> {
    if expected != actual {
        return Err(ModelError::ShapeMismatch {
            expected: expected.to_vec(),
            actual:   actual.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    fn small_config() -> TransformerConfig {
        TransformerConfig::new()
            .with_n_embd(16)
            .with_n_head(2)
            .with_n_layer(2)
            .with_block_size(8)
            .with_vocab_size(40)
            .with_n_hidden(12)
            .with_n_output(3)
    }

    fn random_ids(rng: &mut StdRng, batch: usize, seq: usize, vocab: usize) -> Vec<i32> {
        (0..batch * seq).map(|_| rng.gen_range(0..vocab as i32)).collect()
    }

    fn tokens<B: Backend>(ids: &[i32], batch: usize, seq: usize, device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_ints(ids, device).reshape([batch, seq])
    }

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    fn assert_all_rows_normalised(maps: &[Tensor<TestBackend, 4>]) {
        for map in maps {
            let [_, _, _, seq] = map.dims();
            for row in to_vec(map.clone()).chunks(seq) {
                let sum: f32 = row.iter().sum();
                assert!((sum - 1.0).abs() < 1e-5, "row sums to {sum}");
            }
        }
    }

    #[test]
    fn test_encoder_shape_contract() {
        let device = Default::default();
        let cfg = small_config();
        let mut rng = StdRng::seed_from_u64(7);
        for mode in PositionalMode::ALL {
            let model = EncoderModel::<TestBackend>::new(&cfg, mode, &device).unwrap();
            let ids = random_ids(&mut rng, 4, 8, cfg.vocab_size);
            let out = model.forward(tokens(&ids, 4, 8, &device), None).unwrap();
            assert_eq!(out.logits.dims(), [4, 3]);
            assert!(out.loss.is_none());
            assert_eq!(out.attention_maps.len(), 2);
            assert_eq!(out.attention_maps[0].dims(), [4, 2, 8, 8]);
            assert!(out.attention_maps.iter().all(|a| a.dims() == [4, 2, 8, 8]));
            assert_all_rows_normalised(&out.attention_maps);
        }
    }

    #[test]
    fn test_decoder_shape_contract_and_causality() {
        let device = Default::default();
        let cfg = small_config();
        let mut rng = StdRng::seed_from_u64(11);
        for mode in PositionalMode::ALL {
            let model = DecoderModel::<TestBackend>::new(&cfg, mode, &device).unwrap();
            let ids = random_ids(&mut rng, 3, 6, cfg.vocab_size);
            let out = model.forward(tokens(&ids, 3, 6, &device), None).unwrap();
            assert_eq!(out.logits.dims(), [3, 6, 40]);
            assert_all_rows_normalised(&out.attention_maps);

            for map in out.attention_maps {
                for (r, row) in to_vec(map).chunks(6).enumerate() {
                    let query = r % 6;
                    assert!(row[query + 1..].iter().all(|&w| w == 0.0));
                }
            }
        }
    }

    #[test]
    fn test_shorter_sequences_are_accepted() {
        let device = Default::default();
        let model = DecoderModel::<TestBackend>::new(&small_config(), PositionalMode::Absolute, &device).unwrap();
        let out = model.forward(tokens(&[1, 2, 3], 1, 3, &device), None).unwrap();
        assert_eq!(out.logits.dims(), [1, 3, 40]);
    }

    #[test]
    fn test_length_violation_is_rejected() {
        let device = Default::default();
        let cfg = small_config();
        let encoder = EncoderModel::<TestBackend>::new(&cfg, PositionalMode::Absolute, &device).unwrap();
        let decoder = DecoderModel::<TestBackend>::new(&cfg, PositionalMode::AttentionBias, &device).unwrap();
        let ids = vec![1; 9];

        assert!(matches!(
            encoder.forward(tokens(&ids, 1, 9, &device), None),
            Err(ModelError::LengthViolation { len: 9, block_size: 8 })
        ));
        assert!(matches!(
            decoder.forward(tokens(&ids, 1, 9, &device), None),
            Err(ModelError::LengthViolation { len: 9, block_size: 8 })
        ));
    }

    #[test]
    fn test_bad_config_fails_at_construction() {
        let device = Default::default();
        let cfg = small_config().with_n_head(3);
        assert!(matches!(
            EncoderModel::<TestBackend>::new(&cfg, PositionalMode::Absolute, &device),
            Err(ModelError::ConfigMismatch(_))
        ));
        assert!(matches!(
            DecoderModel::<TestBackend>::new(&cfg, PositionalMode::Disabled, &device),
            Err(ModelError::ConfigMismatch(_))
        ));
    }

    #[test]
    fn test_target_shape_mismatch_is_rejected() {
        let device = Default::default();
        let model = DecoderModel::<TestBackend>::new(&small_config(), PositionalMode::Disabled, &device).unwrap();
        let result = model.forward(tokens(&[1, 2, 3, 4], 1, 4, &device), Some(tokens(&[1, 2, 3], 1, 3, &device)));
        assert!(matches!(result, Err(ModelError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_no_positional_signal_is_permutation_equivariant() {
        let device = Default::default();
        let cfg = small_config();
        let model = EncoderModel::<TestBackend>::new(&cfg, PositionalMode::Disabled, &device).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let ids = random_ids(&mut rng, 1, 8, cfg.vocab_size);
        let mut order: Vec<usize> = (0..8).collect();
        order.shuffle(&mut rng);
        let permuted: Vec<i32> = order.iter().map(|&i| ids[i]).collect();

        let base = to_vec(model.encode(tokens(&ids, 1, 8, &device)).unwrap().hidden);
        let moved = to_vec(model.encode(tokens(&permuted, 1, 8, &device)).unwrap().hidden);

        // moved[p] is the representation of original position order[p]
        for (p, &src) in order.iter().enumerate() {
            for c in 0..16 {
                assert!((moved[p * 16 + c] - base[src * 16 + c]).abs() < 1e-4);
            }
        }

        // pooled logits are therefore order-invariant
        let a = to_vec(model.forward(tokens(&ids, 1, 8, &device), None).unwrap().logits);
        let b = to_vec(model.forward(tokens(&permuted, 1, 8, &device), None).unwrap().logits);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_positional_modes_break_permutation_equivariance() {
        let device = Default::default();
        let cfg = small_config();
        let ids: Vec<i32> = vec![3, 9, 14, 27, 5, 31, 2, 18];
        // rotating the first three tokens changes pairwise distances,
        // unlike a full reversal which the symmetric bias cannot see
        let order = [2usize, 0, 1, 3, 4, 5, 6, 7];
        let permuted: Vec<i32> = order.iter().map(|&i| ids[i]).collect();

        for mode in [PositionalMode::Absolute, PositionalMode::AttentionBias] {
            let model = EncoderModel::<TestBackend>::new(&cfg, mode, &device).unwrap();
            let base = to_vec(model.encode(tokens(&ids, 1, 8, &device)).unwrap().hidden);
            let moved = to_vec(model.encode(tokens(&permuted, 1, 8, &device)).unwrap().hidden);

            let max_diff = (0..8)
                .flat_map(|p| (0..16).map(move |c| (p, c)))
                .map(|(p, c)| (moved[p * 16 + c] - base[order[p] * 16 + c]).abs())
                .fold(0.0f32, f32::max);
            assert!(max_diff > 1e-5, "{mode} behaved permutation-equivariantly");
        }
    }

    #[test]
    fn test_loss_is_near_zero_for_confident_correct_predictions() {
        let device = Default::default();
        let (batch, seq, vocab) = (2, 4, 10);
        let targets: Vec<i32> = vec![1, 4, 7, 2, 0, 9, 3, 3];

        let mut logits = vec![0.0f32; batch * seq * vocab];
        for (n, &t) in targets.iter().enumerate() {
            logits[n * vocab + t as usize] = 50.0;
        }
        let logits = Tensor::<TestBackend, 3>::from_data(TensorData::new(logits, [batch, seq, vocab]), &device);

        let loss = language_model_loss(logits, tokens(&targets, batch, seq, &device));
        let loss: f32 = loss.into_scalar().elem();
        assert!(loss.abs() < 1e-4, "loss = {loss}");
    }

    #[test]
    fn test_uniform_logits_give_vocab_sized_perplexity() {
        let device = Default::default();
        let vocab = 25;
        let logits = Tensor::<TestBackend, 3>::zeros([2, 5, vocab], &device);
        let targets = tokens(&[0, 3, 7, 9, 24, 1, 1, 2, 13, 20], 2, 5, &device);

        let loss: f64 = language_model_loss(logits, targets).into_scalar().elem();
        assert!((perplexity(loss) - vocab as f64).abs() < 1e-3);
    }

    #[test]
    fn test_untrained_decoder_perplexity_is_close_to_vocab_size() {
        let device = Default::default();
        let cfg = small_config().with_vocab_size(50);
        let model = DecoderModel::<TestBackend>::new(&cfg, PositionalMode::Absolute, &device).unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        let ids = random_ids(&mut rng, 8, 8, 50);
        let targets = random_ids(&mut rng, 8, 8, 50);
        let out = model
            .forward(tokens(&ids, 8, 8, &device), Some(tokens(&targets, 8, 8, &device)))
            .unwrap();

        let loss: f64 = out.loss.unwrap().into_scalar().elem();
        let ppl = perplexity(loss);
        assert!(ppl > 25.0 && ppl < 100.0, "perplexity {ppl}");
    }

    #[test]
    fn test_classifier_loss_present_with_labels() {
        let device = Default::default();
        let model = EncoderModel::<TestBackend>::new(&small_config(), PositionalMode::Absolute, &device).unwrap();
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 2], &device);
        let out = model.forward(tokens(&[1, 2, 3, 4, 5, 6, 7, 8], 2, 4, &device), Some(labels)).unwrap();
        let loss: f32 = out.loss.unwrap().into_scalar().elem();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_gradients_reach_embeddings_and_heads() {
        let device = Default::default();
        let cfg = small_config();
        let model = DecoderModel::<TestAutodiffBackend>::new(&cfg, PositionalMode::AttentionBias, &device).unwrap();

        let ids: Vec<i32> = (0..16).map(|i| i % 40).collect();
        let targets: Vec<i32> = (1..17).map(|i| i % 40).collect();
        let out = model
            .forward(tokens(&ids, 2, 8, &device), Some(tokens(&targets, 2, 8, &device)))
            .unwrap();
        let grads = out.loss.unwrap().backward();

        let embedding_grad = model.stack.token_embedding.weight.grad(&grads).expect("embedding grad");
        let head_grad = model.lm_head.weight.grad(&grads).expect("head grad");
        let embedding_norm: f32 = embedding_grad.abs().sum().into_scalar().elem();
        let head_norm: f32 = head_grad.abs().sum().into_scalar().elem();
        assert!(embedding_norm > 0.0);
        assert!(head_norm > 0.0);
    }

    #[test]
    fn test_reference_scale_forward_pass() {
        // d=64, h=2, L=4, block 32, vocab 5755, batch 16
        let device = Default::default();
        let cfg = TransformerConfig::new();
        let mut rng = StdRng::seed_from_u64(42);
        let ids = random_ids(&mut rng, 16, 32, 5755);
        let targets = random_ids(&mut rng, 16, 32, 5755);
        let labels: Vec<i32> = (0..16).map(|i| i % 3).collect();

        let encoder = EncoderModel::<TestBackend>::new(&cfg, PositionalMode::Absolute, &device).unwrap();
        let out = encoder
            .forward(
                tokens(&ids, 16, 32, &device),
                Some(Tensor::<TestBackend, 1, Int>::from_ints(labels.as_slice(), &device)),
            )
            .unwrap();
        assert_eq!(out.logits.dims(), [16, 3]);
        assert!(to_vec(out.logits).iter().all(|v| v.is_finite()));
        let loss: f32 = out.loss.unwrap().into_scalar().elem();
        assert!(loss.is_finite());

        let decoder = DecoderModel::<TestBackend>::new(&cfg, PositionalMode::Absolute, &device).unwrap();
        let out = decoder
            .forward(tokens(&ids, 16, 32, &device), Some(tokens(&targets, 16, 32, &device)))
            .unwrap();
        assert_eq!(out.logits.dims(), [16, 32, 5755]);
        assert!(to_vec(out.logits).iter().all(|v| v.is_finite()));
        let loss: f32 = out.loss.unwrap().into_scalar().elem();
        assert!(loss.is_finite());
    }
}
