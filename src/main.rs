use anyhow::Result;
use clap::Parser;
use tinybert_distill::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive("tinybert_distill=info".parse()?)
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    Cli::parse().run()
}
