// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implements burn's Batcher trait for both tasks, turning a
// Vec of samples into tensors on the target device.
//
// Classification samples have arbitrary length, so every
// sequence is right-padded with <pad> (id 0) and truncated to
// exactly block_size:
//
//   [5, 9, 2]            block 5 → [5, 9, 2, 0, 0]
//   [5, 9, 2, 7, 7, 3]   block 5 → [5, 9, 2, 7, 7]
//
// Truncation happens here, never inside the model, so the
// model is never handed a sequence longer than its block.
//
// Language-modeling windows already have a fixed length and
// are stacked as they are.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::{ClassificationSample, LmSample};
use crate::data::tokenizer::PAD_ID;

/// Token ids `[batch, block_size]` and class labels `[batch]`.
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    pub tokens: Tensor<B, 2, Int>,
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    device:     B::Device,
    block_size: usize,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device, block_size: usize) -> Self {
        Self { device, block_size }
    }
}

/// Right-pad with `<pad>` or truncate to exactly `block_size` ids.
pub fn pad_or_truncate(ids: &[u32], block_size: usize) -> Vec<u32> {
    ids.iter()
        .copied()
        .chain(std::iter::repeat(PAD_ID))
        .take(block_size)
        .collect()
}

impl<B: Backend> Batcher<ClassificationSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ClassificationSample>) -> ClassificationBatch<B> {
        let batch_size = items.len();

        let token_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| pad_or_truncate(&s.token_ids, self.block_size))
            .map(|id| id as i32)
            .collect();
        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        let tokens = Tensor::<B, 1, Int>::from_ints(token_flat.as_slice(), &self.device)
            .reshape([batch_size, self.block_size]);
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ClassificationBatch { tokens, labels }
    }
}

/// Input windows and their next-token targets, both `[batch, seq]`.
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    pub inputs:  Tensor<B, 2, Int>,
    pub targets: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<LmSample, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<LmSample>) -> LmBatch<B> {
        let batch_size = items.len();
        let seq_len = items.first().map_or(0, |s| s.input_ids.len());

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();
        let target_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.target_ids.iter().map(|&x| x as i32))
            .collect();

        let inputs = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let targets = Tensor::<B, 1, Int>::from_ints(target_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);

        LmBatch { inputs, targets }
    }
}
