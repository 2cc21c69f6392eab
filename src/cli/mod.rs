// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to a
// use case on the selected backend:
//
//   classify        speaker classification (encoder)
//   language-model  next-token prediction + perplexity (decoder)
//   ablation        both tasks without positions / with distance bias
//   explore         deeper classifier with a capped vocabulary

pub mod commands;

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use clap::Parser;
use commands::{BackendKind, Commands};

use crate::application::{
    classification_use_case::{ClassificationRunConfig, ClassificationUseCase},
    experiments::{run_ablation, run_explore},
    language_model_use_case::{LanguageModelRunConfig, LanguageModelUseCase},
};
use crate::ml::backend::{cpu_device, gpu_device, CpuBackend, GpuBackend};

#[derive(Parser, Debug)]
#[command(
    name = "speech-transformer",
    version,
    about = "Train transformer encoders and decoders on presidential speeches."
)]
pub struct Cli {
    /// Directory holding train_CLS.tsv, test_CLS.tsv, train_LM.txt and test_LM_*.txt
    #[arg(long, global = true, default_value = "speechesdataset")]
    pub data_dir: String,

    #[arg(long, global = true, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,

    /// Write per-epoch / per-evaluation CSV files here
    #[arg(long, global = true)]
    pub metrics_dir: Option<String>,

    /// Write attention heat maps (PNG + JSON) here
    #[arg(long, global = true)]
    pub maps_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.backend {
            BackendKind::Wgpu => {
                let device = gpu_device();
                tracing::info!("Using WGPU device: {:?}", device);
                self.dispatch::<GpuBackend>(&device)
            }
            BackendKind::Cpu => {
                let device = cpu_device();
                tracing::info!("Using CPU device: {:?}", device);
                self.dispatch::<CpuBackend>(&device)
            }
        }
    }

    fn dispatch<B: AutodiffBackend>(self, device: &B::Device) -> Result<()> {
        let Cli { data_dir, metrics_dir, maps_dir, command, .. } = self;

        match command {
            Commands::Classify(args) => {
                let cfg = args.into_config(data_dir, metrics_dir, maps_dir);
                ClassificationUseCase::new(cfg).execute::<B>(device)?;
            }
            Commands::LanguageModel(args) => {
                let cfg = args.into_config(data_dir, metrics_dir, maps_dir);
                LanguageModelUseCase::new(cfg).execute::<B>(device)?;
            }
            Commands::Ablation => {
                let cls = ClassificationRunConfig {
                    data_dir:    data_dir.clone(),
                    metrics_dir: metrics_dir.clone(),
                    maps_dir:    maps_dir.clone(),
                    ..ClassificationRunConfig::default()
                };
                let lm = LanguageModelRunConfig { data_dir, metrics_dir, maps_dir, ..LanguageModelRunConfig::default() };
                let summary = run_ablation::<B>(&cls, &lm, device)?;
                for line in summary.comparison_lines() {
                    println!("{line}");
                }
            }
            Commands::Explore => {
                let base = ClassificationRunConfig { data_dir, metrics_dir, maps_dir, ..ClassificationRunConfig::default() };
                let summary = run_explore::<B>(&base, device)?;
                if let Some(acc) = summary.final_test_accuracy() {
                    println!("Final test accuracy: {acc:.2}%");
                }
            }
        }
        Ok(())
    }
}
