// ============================================================
// Layer 4 — Datasets
// ============================================================
// Two burn `Dataset`s, one per task.
//
//   ClassificationDataset   one sample per speech:
//                           (token ids of any length, label)
//
//   LanguageModelingDataset the whole text is encoded once;
//                           sample i is a sliding window
//                             input  = ids[i .. i+T]
//                             target = ids[i+1 .. i+T+1]
//                           so there are len(ids) - T samples.

use anyhow::Result;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::speech::LabeledSpeech;
use crate::domain::traits::TextTokenizer;

/// One encoded speech with its class index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub token_ids: Vec<u32>,
    pub label:     usize,
}

pub struct ClassificationDataset {
    samples: Vec<ClassificationSample>,
}

impl ClassificationDataset {
    pub fn new(samples: Vec<ClassificationSample>) -> Self {
        Self { samples }
    }

    pub fn from_speeches(tokenizer: &impl TextTokenizer, speeches: &[LabeledSpeech]) -> Result<Self> {
        let samples = speeches
            .iter()
            .map(|s| {
                Ok(ClassificationSample { token_ids: tokenizer.encode(&s.text)?, label: s.label() })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { samples })
    }

    /// Number of samples per class, indexed by label.
    pub fn class_counts(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for s in &self.samples {
            if let Some(c) = counts.get_mut(s.label) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<ClassificationSample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<ClassificationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// An input window and the same window shifted one token to the right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmSample {
    pub input_ids:  Vec<u32>,
    pub target_ids: Vec<u32>,
}

pub struct LanguageModelingDataset {
    ids:        Vec<u32>,
    block_size: usize,
}

impl LanguageModelingDataset {
    pub fn new(ids: Vec<u32>, block_size: usize) -> Self {
        Self { ids, block_size }
    }

    pub fn from_text(tokenizer: &impl TextTokenizer, text: &str, block_size: usize) -> Result<Self> {
        Ok(Self::new(tokenizer.encode(text)?, block_size))
    }

    pub fn token_count(&self) -> usize {
        self.ids.len()
    }
}

impl Dataset<LmSample> for LanguageModelingDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        if index >= self.len() {
            return None;
        }
        let t = self.block_size;
        Some(LmSample {
            input_ids:  self.ids[index..index + t].to_vec(),
            target_ids: self.ids[index + 1..index + t + 1].to_vec(),
        })
    }

    fn len(&self) -> usize {
        self.ids.len().saturating_sub(self.block_size)
    }
}
