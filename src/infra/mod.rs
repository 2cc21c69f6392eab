// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Output side effects shared by the training runs:
//
//   metrics.rs  — per-epoch / per-evaluation CSV logging
//   heatmap.rs  — attention maps as PNG images and JSON
//
// Neither touches burn; they consume plain host-side values.

/// Training metrics CSV logger
pub mod metrics;

/// Attention heat-map rendering
pub mod heatmap;
