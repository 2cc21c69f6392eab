#![recursion_limit = "256"]

//! From-scratch transformer encoder and decoder trained on political
//! speeches: speaker classification, causal language modeling, and
//! positional-signal ablations.
//!
//! Layers, outermost first: `cli` → `application` → `domain` / `data`
//! → `ml` → `infra`.

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
