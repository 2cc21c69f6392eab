// ============================================================
// Layer 5 — Model Error Taxonomy
// ============================================================
// Every failure the transformer core can report. All of them
// are local and fatal for the call that raised them; retry
// policy (if any) belongs to the application layer.

/// Errors raised while building or running a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Hyperparameters that cannot produce a valid model, or a model
    /// whose vocabulary disagrees with the tokenizer feeding it.
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// A sequence longer than the configured block length.
    /// Truncation is the collator's job, never the model's.
    #[error("sequence length {len} exceeds block size {block_size}")]
    LengthViolation { len: usize, block_size: usize },

    /// Zero-length input; there is nothing to attend over.
    #[error("input sequence is empty")]
    EmptySequence,

    /// Labels/targets whose shape does not line up with the inputs.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    /// The tokenizer could not turn an input sentence into ids.
    #[error("cannot tokenize input: {0}")]
    Tokenization(String),

    /// Reading tensor values back to the host failed.
    #[error("cannot read tensor data: {0}")]
    TensorData(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
