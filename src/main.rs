use anyhow::Result;
use clap::Parser;
use speech_transformer::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("speech_transformer=info".parse()?))
        .init();

    let cli = Cli::parse();
    cli.run()
}
