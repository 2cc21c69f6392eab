// ============================================================
// Layer 5 — Training Loops
// ============================================================
// Two loops, one per task, both generic over an autodiff
// backend:
//
//   train_classifier      fixed number of epochs over the shuffled
//                         training speeches; after every epoch the
//                         mean loss and train/test accuracy
//
//   train_language_model  at most max_iters minibatches; at the
//                         first iteration and every eval_interval
//                         iterations, perplexity on the training
//                         text and on every held-out corpus
//
// Each step is strictly sequential: forward, loss, backward,
// AdamW update. Evaluation uses model.valid(), i.e. the same
// weights on the inner backend with dropout off, fed by loaders
// built on the inner backend.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use burn::{
    config::Config,
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::{ClassificationBatcher, LmBatcher};
use crate::data::dataset::{ClassificationDataset, LanguageModelingDataset};
use crate::infra::metrics::{EpochMetrics, MetricsLogger, PerplexityReport};
use crate::ml::config::TransformerConfig;
use crate::ml::evaluation::{compute_classifier_accuracy, compute_perplexity};
use crate::ml::model::{DecoderModel, EncoderModel};

const DATA_WORKERS: usize = 1;

#[derive(Config, Debug)]
pub struct ClassifierTrainingConfig {
    #[config(default = 15)]
    pub epochs: usize,

    #[config(default = 1e-3)]
    pub learning_rate: f64,

    /// Multiply the learning rate by `lr_gamma` every this many epochs
    #[config(default = "None")]
    pub lr_step_size: Option<usize>,

    #[config(default = 1.0)]
    pub lr_gamma: f64,

    #[config(default = 0.01)]
    pub weight_decay: f64,

    #[config(default = 42)]
    pub seed: u64,
}

#[derive(Config, Debug)]
pub struct LanguageModelTrainingConfig {
    #[config(default = 500)]
    pub max_iters: usize,

    #[config(default = 100)]
    pub eval_interval: usize,

    /// Batches per corpus when estimating perplexity
    #[config(default = 200)]
    pub eval_iters: usize,

    #[config(default = 1e-3)]
    pub learning_rate: f64,

    #[config(default = 0.01)]
    pub weight_decay: f64,

    #[config(default = 42)]
    pub seed: u64,
}

/// Step decay: `base * gamma^(epoch / step)` for a 0-based epoch.
pub fn scheduled_learning_rate(base: f64, epoch: usize, step_size: Option<usize>, gamma: f64) -> f64 {
    match step_size {
        Some(step) if step > 0 => base * gamma.powi((epoch / step) as i32),
        _ => base,
    }
}

/// Whether iteration `i` (0-based) is an evaluation point.
pub fn is_eval_iteration(i: usize, eval_interval: usize) -> bool {
    i == 0 || (eval_interval > 0 && (i + 1) % eval_interval == 0)
}

pub fn train_classifier<B: AutodiffBackend>(
    mut model:    EncoderModel<B>,
    model_config: &TransformerConfig,
    cfg:          &ClassifierTrainingConfig,
    train_set:    ClassificationDataset,
    test_set:     ClassificationDataset,
    device:       &B::Device,
    metrics:      Option<&MetricsLogger>,
) -> Result<(EncoderModel<B>, Vec<EpochMetrics>)> {
    let train_set = Arc::new(train_set);
    let test_set  = Arc::new(test_set);
    let block     = model_config.block_size;

    // ── Loaders: autodiff for the updates, inner backend for accuracy ───────
    let train_loader = DataLoaderBuilder::new(ClassificationBatcher::<B>::new(device.clone(), block))
        .batch_size(model_config.batch_size)
        .shuffle(cfg.seed)
        .num_workers(DATA_WORKERS)
        .build(train_set.clone());

    let eval_batcher = ClassificationBatcher::<B::InnerBackend>::new(device.clone(), block);
    let train_eval_loader = DataLoaderBuilder::new(eval_batcher.clone())
        .batch_size(model_config.batch_size)
        .num_workers(DATA_WORKERS)
        .build(train_set);
    let test_loader = DataLoaderBuilder::new(eval_batcher)
        .batch_size(model_config.batch_size)
        .num_workers(DATA_WORKERS)
        .build(test_set);

    let mut optim = AdamWConfig::new().with_weight_decay(cfg.weight_decay as f32).init();
    let mut history = Vec::with_capacity(cfg.epochs);
    let mut best_test_accuracy = f64::NEG_INFINITY;

    for epoch in 0..cfg.epochs {
        let lr = scheduled_learning_rate(cfg.learning_rate, epoch, cfg.lr_step_size, cfg.lr_gamma);

        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in train_loader.iter() {
            let output = model.forward(batch.tokens, Some(batch.labels))?;
            let loss = required_loss(output.loss, "classifier")?;

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(lr, model, grads);
        }

        let train_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };

        let model_valid = model.valid();
        let train_accuracy = compute_classifier_accuracy(&model_valid, train_eval_loader.iter())?;
        let test_accuracy  = compute_classifier_accuracy(&model_valid, test_loader.iter())?;

        println!(
            "Epoch {}: Training Loss: {:.4} || Accuracy on train set: {:.4}% || Accuracy on test set: {:.2}%",
            epoch + 1, train_loss, train_accuracy, test_accuracy,
        );
        tracing::debug!("Epoch {} used learning rate {:.6}", epoch + 1, lr);

        let row = EpochMetrics::new(epoch + 1, train_loss, train_accuracy, test_accuracy, lr);
        if row.is_improvement(best_test_accuracy) {
            best_test_accuracy = row.test_accuracy;
            tracing::info!("New best test accuracy {:.2}% at epoch {}", best_test_accuracy, epoch + 1);
        }
        if let Some(logger) = metrics {
            logger.log(&row)?;
        }
        history.push(row);
    }

    tracing::info!("Classifier training complete after {} epochs", cfg.epochs);
    Ok((model, history))
}

pub fn train_language_model<B: AutodiffBackend>(
    mut model:    DecoderModel<B>,
    model_config: &TransformerConfig,
    cfg:          &LanguageModelTrainingConfig,
    train_set:    LanguageModelingDataset,
    held_out:     Vec<(String, LanguageModelingDataset)>,
    device:       &B::Device,
    metrics:      Option<&MetricsLogger>,
) -> Result<(DecoderModel<B>, Vec<PerplexityReport>)> {
    let train_set = Arc::new(train_set);

    let train_loader = DataLoaderBuilder::new(LmBatcher::<B>::new(device.clone()))
        .batch_size(model_config.batch_size)
        .shuffle(cfg.seed)
        .num_workers(DATA_WORKERS)
        .build(train_set.clone());

    let eval_batcher = LmBatcher::<B::InnerBackend>::new(device.clone());
    let train_eval_loader = DataLoaderBuilder::new(eval_batcher.clone())
        .batch_size(model_config.batch_size)
        .shuffle(cfg.seed)
        .num_workers(DATA_WORKERS)
        .build(train_set);
    let held_out_loaders: Vec<_> = held_out
        .into_iter()
        .map(|(name, dataset)| {
            let loader = DataLoaderBuilder::new(eval_batcher.clone())
                .batch_size(model_config.batch_size)
                .shuffle(cfg.seed)
                .num_workers(DATA_WORKERS)
                .build(dataset);
            (name, loader)
        })
        .collect();

    let mut optim   = AdamWConfig::new().with_weight_decay(cfg.weight_decay as f32).init();
    let mut reports = Vec::new();

    for (i, batch) in train_loader.iter().enumerate() {
        if i >= cfg.max_iters {
            break;
        }

        if is_eval_iteration(i, cfg.eval_interval) {
            let model_valid = model.valid();
            let train = compute_perplexity(&model_valid, train_eval_loader.iter(), cfg.eval_iters)?;
            let mut scores = Vec::with_capacity(held_out_loaders.len());
            for (name, loader) in &held_out_loaders {
                scores.push((name.clone(), compute_perplexity(&model_valid, loader.iter(), cfg.eval_iters)?));
            }

            let report = PerplexityReport::new(i + 1, train, scores);
            println!("{}", report.summary_line());
            if let Some(logger) = metrics {
                logger.log(&report)?;
            }
            reports.push(report);
        }

        let output = model.forward(batch.inputs, Some(batch.targets))?;
        let loss = required_loss(output.loss, "language model")?;
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(cfg.learning_rate, model, grads);
    }

    tracing::info!("Language-model training complete ({} evaluation points)", reports.len());
    Ok((model, reports))
}

// a forward pass given labels/targets always carries a loss
fn required_loss<B: Backend>(loss: Option<Tensor<B, 1>>, model: &str) -> Result<Tensor<B, 1>> {
    loss.ok_or_else(|| anyhow!("{model} forward pass returned no loss for a labelled batch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ClassificationSample;
    use crate::ml::positional::PositionalMode;
    use burn::backend::{Autodiff, NdArray};

    type TestAutodiffBackend = Autodiff<NdArray>;

    fn tiny_config() -> TransformerConfig {
        TransformerConfig::new()
            .with_batch_size(4)
            .with_block_size(6)
            .with_n_embd(16)
            .with_n_head(2)
            .with_n_layer(1)
            .with_vocab_size(20)
            .with_n_hidden(8)
    }

    #[test]
    fn test_step_learning_rate() {
        assert_eq!(scheduled_learning_rate(1e-3, 7, None, 0.5), 1e-3);
        assert!((scheduled_learning_rate(1.0, 4, Some(5), 0.75) - 1.0).abs() < 1e-12);
        assert!((scheduled_learning_rate(1.0, 5, Some(5), 0.75) - 0.75).abs() < 1e-12);
        assert!((scheduled_learning_rate(1.0, 12, Some(5), 0.75) - 0.5625).abs() < 1e-12);
    }

    #[test]
    fn test_eval_iterations() {
        let points: Vec<usize> = (0..500).filter(|&i| is_eval_iteration(i, 100)).collect();
        assert_eq!(points, vec![0, 99, 199, 299, 399, 499]);
    }

    #[test]
    fn test_missing_loss_is_an_error() {
        let device = Default::default();
        let loss = Tensor::<NdArray, 1>::from_floats([0.5], &device);
        assert!(required_loss(Some(loss), "classifier").is_ok());

        let err = required_loss::<NdArray>(None, "language model").unwrap_err();
        assert!(err.to_string().contains("language model"));
    }

    #[test]
    fn test_classifier_training_records_every_epoch() {
        let device = Default::default();
        let cfg = tiny_config();
        let samples: Vec<ClassificationSample> = (0..12)
            .map(|i| ClassificationSample { token_ids: vec![(i % 3 + 2) as u32; 5], label: i % 3 })
            .collect();
        let model = EncoderModel::<TestAutodiffBackend>::new(&cfg, PositionalMode::Absolute, &device).unwrap();
        let train_cfg = ClassifierTrainingConfig::new().with_epochs(3).with_learning_rate(1e-2);

        let (_, history) = train_classifier(
            model,
            &cfg,
            &train_cfg,
            ClassificationDataset::new(samples.clone()),
            ClassificationDataset::new(samples),
            &device,
            None,
        )
        .unwrap();

        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|m| m.train_loss.is_finite()));
        assert!(history.iter().all(|m| (0.0..=100.0).contains(&m.test_accuracy)));
    }

    #[test]
    fn test_language_model_training_evaluates_on_schedule() {
        let device = Default::default();
        let cfg = tiny_config();
        let ids: Vec<u32> = (0..60).map(|i| (i % 7 + 2) as u32).collect();
        let held_out = vec![("obama".to_string(), LanguageModelingDataset::new(ids[..20].to_vec(), 6))];
        let model = DecoderModel::<TestAutodiffBackend>::new(&cfg, PositionalMode::AttentionBias, &device).unwrap();
        let train_cfg = LanguageModelTrainingConfig::new()
            .with_max_iters(5)
            .with_eval_interval(2)
            .with_eval_iters(3);

        let (_, reports) = train_language_model(
            model,
            &cfg,
            &train_cfg,
            LanguageModelingDataset::new(ids, 6),
            held_out,
            &device,
            None,
        )
        .unwrap();

        // 54 windows / batch 4 = 14 batches; iterations 0, 1, 3 are evaluation points
        let iterations: Vec<usize> = reports.iter().map(|r| r.iteration).collect();
        assert_eq!(iterations, vec![1, 2, 4]);
        assert!(reports.iter().all(|r| r.train.is_finite()));
        assert_eq!(reports[0].held_out[0].0, "obama");
    }
}
