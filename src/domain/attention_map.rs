// ============================================================
// Layer 3 — Attention Map
// ============================================================
// A single layer/head attention matrix copied off the device
// for inspection. Row `i` is the distribution of query position
// `i` over every key position, so each row should sum to 1.

use serde::{Deserialize, Serialize};

/// One `[seq, seq]` attention matrix, identified by layer and head (both 0-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionMap {
    pub layer:   usize,
    pub head:    usize,
    pub weights: Vec<Vec<f32>>,
}

impl AttentionMap {
    pub fn new(layer: usize, head: usize, weights: Vec<Vec<f32>>) -> Self {
        Self { layer, head, weights }
    }

    /// Build from a row-major flat buffer of `seq * seq` values.
    pub fn from_flat(layer: usize, head: usize, seq_len: usize, values: &[f32]) -> Self {
        let weights = values.chunks(seq_len.max(1)).map(<[f32]>::to_vec).collect();
        Self { layer, head, weights }
    }

    pub fn seq_len(&self) -> usize {
        self.weights.len()
    }

    pub fn row_sums(&self) -> Vec<f32> {
        self.weights.iter().map(|row| row.iter().sum()).collect()
    }

    /// Largest `|row_sum - 1|` over all rows.
    pub fn max_row_deviation(&self) -> f32 {
        self.row_sums()
            .into_iter()
            .map(|s| (s - 1.0).abs())
            .fold(0.0, f32::max)
    }

    pub fn is_normalized(&self, tolerance: f32) -> bool {
        self.max_row_deviation() <= tolerance
    }

    /// Largest single weight, used to scale heat maps.
    pub fn max_weight(&self) -> f32 {
        self.weights
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f32::max)
    }

    /// For each query position, the key position it attends to most.
    pub fn argmax_per_row(&self) -> Vec<usize> {
        self.weights
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::MIN), |best, (j, &w)| if w > best.1 { (j, w) } else { best })
                    .0
            })
            .collect()
    }

    pub fn label(&self) -> String {
        format!("L{}_H{}", self.layer + 1, self.head + 1)
    }
}
