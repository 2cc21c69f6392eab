// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The transformer core and everything that drives it:
//
//   config.rs        — architecture hyperparameters
//   error.rs         — what the core can fail with
//   positional.rs    — absolute / none / distance-bias strategies
//   attention.rs     — multi-head self-attention with mask + bias
//   block.rs         — feed-forward sublayer and pre-norm block
//   model.rs         — encoder (classifier) and decoder (LM)
//   evaluation.rs    — accuracy and perplexity
//   trainer.rs       — the two training loops
//   introspection.rs — attention maps for one sentence
//   backend.rs       — backend aliases used by the CLI
//
// Models are generic over `B: Backend`; only the trainer needs
// an autodiff backend.

pub mod config;
pub mod error;
pub mod positional;
pub mod attention;
pub mod block;
pub mod model;
pub mod evaluation;
pub mod trainer;
pub mod introspection;
pub mod backend;
