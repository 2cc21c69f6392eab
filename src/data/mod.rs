// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the dataset directory and tensor batches:
//
//   speechesdataset/
//       │
//       ▼
//   loader          → reads TSV speeches and raw text files
//       │
//       ▼
//   WordTokenizer   → word-level vocabulary, text → ids
//       │
//       ▼
//   *Dataset        → burn Dataset per task
//       │
//       ▼
//   *Batcher        → pads / stacks into Int tensors
//       │
//       ▼
//   DataLoader      → feeds batches to the training loops

/// Dataset directory layout and file readers
pub mod loader;

/// Word-level vocabulary on top of HuggingFace tokenizers
pub mod tokenizer;

/// burn Datasets for classification and language modeling
pub mod dataset;

/// burn Batchers producing tensor batches
pub mod batcher;
