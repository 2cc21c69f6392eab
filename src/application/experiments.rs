// ============================================================
// Layer 2 — Experiment Suites
// ============================================================
// Multi-run experiments built from the two use cases:
//
//   ablation  classifier and language model with no positional
//             signal, then with the distance bias; four runs,
//             each with a fresh configuration and fresh models
//
//   explore   one deeper classifier run (8 layers, block 48,
//             capped vocabulary, step learning-rate decay)

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;

use crate::application::{
    classification_use_case::{ClassificationRunConfig, ClassificationSummary, ClassificationUseCase},
    language_model_use_case::{LanguageModelRunConfig, LanguageModelSummary, LanguageModelUseCase},
};
use crate::data::loader::HELD_OUT_CORPORA;
use crate::ml::positional::PositionalMode;

pub const ABLATION_MODES: [PositionalMode; 2] = [PositionalMode::Disabled, PositionalMode::AttentionBias];

const SEPARATOR: &str = "-------------------------------------------------------------------------------";

#[derive(Debug, Clone)]
pub struct AblationSummary {
    pub classification: Vec<(PositionalMode, ClassificationSummary)>,
    pub language_model: Vec<(PositionalMode, LanguageModelSummary)>,
}

impl AblationSummary {
    /// One line per run: final test accuracy or final held-out perplexities.
    pub fn comparison_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (mode, run) in &self.classification {
            match run.final_test_accuracy() {
                Some(acc) => lines.push(format!("classifier [{mode}]: test accuracy {acc:.2}%")),
                None => lines.push(format!("classifier [{mode}]: no epochs run")),
            }
        }
        for (mode, run) in &self.language_model {
            let Some(report) = run.final_report() else {
                lines.push(format!("language model [{mode}]: no evaluation points"));
                continue;
            };
            let mut line = format!("language model [{mode}]: train perplexity {:.2}", report.train);
            for corpus in HELD_OUT_CORPORA {
                if let Some(ppl) = report.held_out_perplexity(corpus) {
                    line.push_str(&format!(", {corpus} {ppl:.2}"));
                }
            }
            lines.push(line);
        }
        lines
    }
}

fn mode_description(mode: PositionalMode) -> &'static str {
    match mode {
        PositionalMode::Absolute => "Learned absolute position embedding",
        PositionalMode::Disabled => "No positional embedding",
        PositionalMode::AttentionBias => "Attention with linear distance bias",
    }
}

/// Run every ablation mode for both tasks, starting from the given base configs.
pub fn run_ablation<B: AutodiffBackend>(
    classification: &ClassificationRunConfig,
    language_model: &LanguageModelRunConfig,
    device:         &B::Device,
) -> Result<AblationSummary> {
    let mut summary = AblationSummary { classification: Vec::new(), language_model: Vec::new() };

    for mode in ABLATION_MODES {
        println!("{} used in Classifier", mode_description(mode));
        let cfg = ClassificationRunConfig { positional: mode, ..classification.clone() };
        summary.classification.push((mode, ClassificationUseCase::new(cfg).execute::<B>(device)?));
        println!("{SEPARATOR}");
    }

    for mode in ABLATION_MODES {
        println!("{} used in Language Modeling", mode_description(mode));
        let cfg = LanguageModelRunConfig { positional: mode, ..language_model.clone() };
        summary.language_model.push((mode, LanguageModelUseCase::new(cfg).execute::<B>(device)?));
        println!("{SEPARATOR}");
    }

    Ok(summary)
}

/// The exploration preset, keeping data and output locations from `base`.
pub fn explore_config(base: &ClassificationRunConfig) -> ClassificationRunConfig {
    ClassificationRunConfig {
        data_dir:    base.data_dir.clone(),
        seed:        base.seed,
        metrics_dir: base.metrics_dir.clone(),
        maps_dir:    base.maps_dir.clone(),
        ..ClassificationRunConfig::explore()
    }
}

pub fn run_explore<B: AutodiffBackend>(
    base:   &ClassificationRunConfig,
    device: &B::Device,
) -> Result<ClassificationSummary> {
    let cfg = explore_config(base);
    tracing::info!(
        "Exploration run: {} layers, block {}, vocab cap {:?}, lr step {:?} x {}",
        cfg.n_layer, cfg.block_size, cfg.max_vocab_size, cfg.lr_step_size, cfg.lr_gamma
    );
    ClassificationUseCase::new(cfg).execute::<B>(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::write_toy_corpus;
    use crate::ml::backend::{cpu_device, CpuBackend};

    #[test]
    fn test_explore_config_keeps_locations() {
        let base = ClassificationRunConfig {
            data_dir: "elsewhere".into(),
            maps_dir: Some("maps".into()),
            n_layer:  2,
            ..Default::default()
        };
        let cfg = explore_config(&base);
        assert_eq!(cfg.data_dir, "elsewhere");
        assert_eq!(cfg.maps_dir.as_deref(), Some("maps"));
        assert_eq!(cfg.n_layer, 8);
    }

    #[test]
    fn test_ablation_runs_both_modes_for_both_tasks() {
        let dir = write_toy_corpus("ablation");
        let data_dir = dir.to_string_lossy().into_owned();
        let cls = ClassificationRunConfig {
            data_dir:   data_dir.clone(),
            batch_size: 4,
            block_size: 6,
            n_embd:     8,
            n_layer:    1,
            n_hidden:   4,
            epochs:     1,
            ..Default::default()
        };
        let lm = LanguageModelRunConfig {
            data_dir,
            batch_size:    4,
            block_size:    6,
            n_embd:        8,
            n_layer:       1,
            max_iters:     2,
            eval_interval: 1,
            eval_iters:    1,
            ..Default::default()
        };

        let summary = run_ablation::<CpuBackend>(&cls, &lm, &cpu_device()).unwrap();
        let cls_modes: Vec<PositionalMode> = summary.classification.iter().map(|(m, _)| *m).collect();
        let lm_modes: Vec<PositionalMode> = summary.language_model.iter().map(|(m, _)| *m).collect();
        assert_eq!(cls_modes, ABLATION_MODES.to_vec());
        assert_eq!(lm_modes, ABLATION_MODES.to_vec());
        assert_eq!(summary.language_model[1].1.reports.len(), 2);

        let lines = summary.comparison_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("classifier [none]: test accuracy"));
        assert!(lines[3].starts_with("language model [attention-bias]: train perplexity"));
        assert!(HELD_OUT_CORPORA.iter().all(|c| lines[3].contains(c)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
