//! cfsync - CloudFront security group synchronizer
//!
//! Keeps EC2 security group ingress rules in line with the published CloudFront IP ranges.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cfsync::cli::{Cli, Commands};
use cfsync::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sync { dry_run, format } => {
            let config = load_config(&cli)?;
            cfsync::commands::sync::run(config, dry_run, format).await
        }
        Commands::Plan { format } => {
            let config = load_config(&cli)?;
            cfsync::commands::plan::run(config, format).await
        }
        Commands::Ranges { ref url } => cfsync::commands::ranges::run(url).await,
        Commands::Version => {
            println!("cfsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Config file when given, environment otherwise
fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => Config::from_env().context("Invalid configuration in environment"),
    }
}
