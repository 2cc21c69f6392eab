// ============================================================
// Layer 5 — Attention Introspection
// ============================================================
// Runs one sentence through a model and copies every layer/head
// attention matrix to the host, so the caller can check them and
// render heat maps. The sentence is padded / truncated to the
// block size exactly like a training batch.

use burn::prelude::*;

use crate::data::batcher::pad_or_truncate;
use crate::domain::attention_map::AttentionMap;
use crate::domain::traits::TextTokenizer;
use crate::ml::error::{ModelError, ModelResult};
use crate::ml::model::SequenceModel;

/// Row-sum tolerance for the visual sanity check.
pub const ROW_SUM_TOLERANCE: f32 = 1e-2;

pub fn sanity_check<B: Backend, M: SequenceModel<B>>(
    model:     &M,
    tokenizer: &impl TextTokenizer,
    sentence:  &str,
    device:    &B::Device,
) -> ModelResult<Vec<AttentionMap>> {
    let (model_vocab, tokenizer_vocab) = (model.vocab_size(), tokenizer.vocab_size());
    if model_vocab != tokenizer_vocab {
        return Err(ModelError::ConfigMismatch(format!(
            "model embeds {model_vocab} token ids but the tokenizer produces {tokenizer_vocab}"
        )));
    }

    let block_size = model.block_size();
    let encoded = tokenizer
        .encode(sentence)
        .map_err(|e| ModelError::Tokenization(e.to_string()))?;
    let ids = pad_or_truncate(&encoded, block_size);
    tracing::info!("Sanity check input ({} positions): {:?}", model.positional_mode(), sentence);
    tracing::debug!("Token ids: {:?}", ids);

    let flat: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
    let tokens = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device).reshape([1, block_size]);

    let layers = model.attention_maps(tokens)?;
    let maps = collect_maps(layers)?;

    for map in &maps {
        if !map.is_normalized(ROW_SUM_TOLERANCE) {
            tracing::warn!(
                "Attention map {} is not normalised: max row deviation {:.4}",
                map.label(),
                map.max_row_deviation()
            );
        }
        tracing::debug!("{} most attended position per query: {:?}", map.label(), map.argmax_per_row());
    }
    tracing::info!("Collected {} attention maps of size {}x{}", maps.len(), block_size, block_size);
    Ok(maps)
}

/// Split per-layer `[1, heads, seq, seq]` tensors into one map per head.
pub fn collect_maps<B: Backend>(layers: Vec<Tensor<B, 4>>) -> ModelResult<Vec<AttentionMap>> {
    let mut maps = Vec::new();
    for (layer, attention) in layers.into_iter().enumerate() {
        let [batch, heads, seq, _] = attention.dims();
        if batch != 1 {
            return Err(ModelError::ShapeMismatch {
                expected: vec![1, heads, seq, seq],
                actual:   attention.dims().to_vec(),
            });
        }
        let values = attention
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ModelError::TensorData(format!("{e:?}")))?;

        for (head, chunk) in values.chunks(seq * seq).enumerate() {
            maps.push(AttentionMap::from_flat(layer, head, seq, chunk));
        }
    }
    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::config::TransformerConfig;
    use crate::ml::model::{DecoderModel, EncoderModel};
    use crate::ml::positional::PositionalMode;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    struct SplitTokenizer;

    impl TextTokenizer for SplitTokenizer {
        fn encode(&self, text: &str) -> anyhow::Result<Vec<u32>> {
            Ok(text.split_whitespace().map(|w| (w.len() % 10 + 2) as u32).collect())
        }

        fn decode(&self, ids: &[u32]) -> String {
            ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" ")
        }

        fn vocab_size(&self) -> usize {
            12
        }
    }

    fn config() -> TransformerConfig {
        TransformerConfig::new()
            .with_n_embd(16)
            .with_n_head(2)
            .with_n_layer(3)
            .with_block_size(10)
            .with_vocab_size(12)
    }

    #[test]
    fn test_encoder_maps_per_layer_and_head() {
        let device = Default::default();
        let model = EncoderModel::<TestBackend>::new(&config(), PositionalMode::Absolute, &device).unwrap();
        let maps = sanity_check(&model, &SplitTokenizer, "we must give all our children", &device).unwrap();

        assert_eq!(maps.len(), 3 * 2);
        assert_eq!((maps[5].layer, maps[5].head), (2, 1));
        for map in &maps {
            assert_eq!(map.seq_len(), 10);
            assert!(map.weights.iter().all(|row| row.len() == 10));
            assert!(map.is_normalized(1e-5));
        }
    }

    #[test]
    fn test_decoder_maps_are_lower_triangular() {
        let device = Default::default();
        let model = DecoderModel::<TestBackend>::new(&config(), PositionalMode::AttentionBias, &device).unwrap();
        let long = "it is costly and politically difficult to continue this conflict today";
        let maps = sanity_check(&model, &SplitTokenizer, long, &device).unwrap();

        for map in &maps {
            assert!(map.is_normalized(ROW_SUM_TOLERANCE));
            for (i, row) in map.weights.iter().enumerate() {
                assert!(row[i + 1..].iter().all(|&w| w == 0.0));
            }
        }
    }

    #[test]
    fn test_vocab_mismatch_rejected() {
        let device = Default::default();
        let model = EncoderModel::<TestBackend>::new(&config().with_vocab_size(40), PositionalMode::Absolute, &device)
            .unwrap();
        let result = sanity_check(&model, &SplitTokenizer, "we must give all our children", &device);
        assert!(matches!(result, Err(ModelError::ConfigMismatch(_))));
    }

    #[test]
    fn test_tokenizer_failure_surfaces() {
        struct FailingTokenizer;

        impl TextTokenizer for FailingTokenizer {
            fn encode(&self, _text: &str) -> anyhow::Result<Vec<u32>> {
                anyhow::bail!("pipeline rejected input")
            }

            fn decode(&self, _ids: &[u32]) -> String {
                String::new()
            }

            fn vocab_size(&self) -> usize {
                12
            }
        }

        let device = Default::default();
        let model = DecoderModel::<TestBackend>::new(&config(), PositionalMode::Disabled, &device).unwrap();
        let result = sanity_check(&model, &FailingTokenizer, "anything", &device);
        assert!(matches!(result, Err(ModelError::Tokenization(_))));
    }

    #[test]
    fn test_batched_maps_are_rejected() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 4>::zeros([2, 1, 3, 3], &device);
        assert!(matches!(collect_maps(vec![t]), Err(ModelError::ShapeMismatch { .. })));
    }
}
