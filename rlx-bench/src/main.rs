mod config;
mod report;
mod runner;

use anyhow::Result;
use clap::Parser;
use config::{Args, ExperimentConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let config = ExperimentConfig::resolve(Args::parse())?;
    runner::run(config)
}
