// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends training metrics to a CSV file, one file per run.
//
//   classification:  epoch,train_loss,train_acc,test_acc,lr
//   language model:  iteration,train_ppl,<corpus>_ppl,...
//
// The header is written when the file is first created, so
// repeated runs against the same directory keep appending.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// Anything that can be written as one CSV row.
pub trait MetricsRow {
    fn csv_header(&self) -> String;
    fn csv_row(&self) -> String;
}

/// Classifier metrics after one epoch. Accuracies are percentages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:          usize,
    pub train_loss:     f64,
    pub train_accuracy: f64,
    pub test_accuracy:  f64,
    pub learning_rate:  f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:          usize,
        train_loss:     f64,
        train_accuracy: f64,
        test_accuracy:  f64,
        learning_rate:  f64,
    ) -> Self {
        Self { epoch, train_loss, train_accuracy, test_accuracy, learning_rate }
    }

    pub fn is_improvement(&self, best_test_accuracy: f64) -> bool {
        self.test_accuracy > best_test_accuracy
    }
}

impl MetricsRow for EpochMetrics {
    fn csv_header(&self) -> String {
        "epoch,train_loss,train_acc,test_acc,lr".to_string()
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{:.6},{:.4},{:.4},{:.8}",
            self.epoch, self.train_loss, self.train_accuracy, self.test_accuracy, self.learning_rate,
        )
    }
}

/// Perplexities at one language-model evaluation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerplexityReport {
    /// 1-based training iteration
    pub iteration: usize,
    pub train:     f64,
    /// (corpus name, perplexity) in reporting order
    pub held_out:  Vec<(String, f64)>,
}

impl PerplexityReport {
    pub fn new(iteration: usize, train: f64, held_out: Vec<(String, f64)>) -> Self {
        Self { iteration, train, held_out }
    }

    pub fn held_out_perplexity(&self, corpus: &str) -> Option<f64> {
        self.held_out.iter().find(|(name, _)| name == corpus).map(|(_, p)| *p)
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!("iter: {} || perp training: {:.4}", self.iteration, self.train);
        for (name, ppl) in &self.held_out {
            line.push_str(&format!(" || perp test on {name}: {ppl:.4}"));
        }
        line
    }
}

impl MetricsRow for PerplexityReport {
    fn csv_header(&self) -> String {
        let mut header = "iteration,train_ppl".to_string();
        for (name, _) in &self.held_out {
            header.push_str(&format!(",{name}_ppl"));
        }
        header
    }

    fn csv_row(&self) -> String {
        let mut row = format!("{},{:.6}", self.iteration, self.train);
        for (_, ppl) in &self.held_out {
            row.push_str(&format!(",{ppl:.6}"));
        }
        row
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Log into `<dir>/<file_name>`, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;
        Ok(Self { csv_path: dir.join(file_name) })
    }

    pub fn log(&self, row: &impl MetricsRow) -> Result<()> {
        let is_new = !self.csv_path.exists();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        if is_new {
            writeln!(f, "{}", row.csv_header())?;
            tracing::debug!("Created metrics CSV: '{}'", self.csv_path.display());
        }
        writeln!(f, "{}", row.csv_row())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
