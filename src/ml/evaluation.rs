// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Accuracy and perplexity over a stream of batches. Both run on
// whatever backend the batches live on; the training loops pass
// the non-autodiff model from `model.valid()` and batches from
// an inner-backend loader, so no graph is recorded here.
//
//   accuracy   = 100 * correct / samples
//   perplexity = exp(mean over batches of the per-batch mean loss)

use burn::prelude::*;

use crate::data::batcher::{ClassificationBatch, LmBatch};
use crate::ml::error::ModelResult;
use crate::ml::model::{perplexity, DecoderModel, EncoderModel};

/// Percentage of samples whose arg-max logit equals the label.
pub fn compute_classifier_accuracy<B: Backend>(
    model:   &EncoderModel<B>,
    batches: impl Iterator<Item = ClassificationBatch<B>>,
) -> ModelResult<f64> {
    let mut correct = 0usize;
    let mut total   = 0usize;

    for batch in batches {
        let output = model.forward(batch.tokens, None)?;
        // argmax(1) is [batch, 1]; flatten before comparing with [batch] labels
        let predicted = output.logits.argmax(1).flatten::<1>(0, 1);
        total += batch.labels.dims()[0];

        let hits: i64 = predicted
            .equal(batch.labels)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        correct += hits as usize;
    }

    Ok(if total > 0 { 100.0 * correct as f64 / total as f64 } else { 0.0 })
}

/// Mean next-token loss over at most `eval_iters` batches.
/// `None` when the stream yields no batches.
pub fn mean_language_model_loss<B: Backend>(
    model:      &DecoderModel<B>,
    batches:    impl Iterator<Item = LmBatch<B>>,
    eval_iters: usize,
) -> ModelResult<Option<f64>> {
    let mut losses = Vec::new();
    for batch in batches.take(eval_iters) {
        let output = model.forward(batch.inputs, Some(batch.targets))?;
        if let Some(loss) = output.loss {
            losses.push(loss.into_scalar().elem::<f64>());
        }
    }

    if losses.is_empty() {
        return Ok(None);
    }
    Ok(Some(losses.iter().sum::<f64>() / losses.len() as f64))
}

/// `exp(mean loss)` over at most `eval_iters` batches; NaN for an empty stream.
pub fn compute_perplexity<B: Backend>(
    model:      &DecoderModel<B>,
    batches:    impl Iterator<Item = LmBatch<B>>,
    eval_iters: usize,
) -> ModelResult<f64> {
    match mean_language_model_loss(model, batches, eval_iters)? {
        Some(loss) => Ok(perplexity(loss)),
        None => {
            tracing::warn!("Perplexity requested on an empty corpus");
            Ok(f64::NAN)
        }
    }
}
