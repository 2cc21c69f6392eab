// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with. No burn types and no file I/O live here, so everything
// in this layer is testable without a device.

/// Speakers and labelled speech excerpts
pub mod speech;

/// Host-side attention matrices for introspection
pub mod attention_map;

/// Tokenizer abstraction shared by the data and ML layers
pub mod traits;
