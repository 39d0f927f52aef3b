//! CLI argument parsing with clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::feed::AWS_IP_RANGES_URL;

#[derive(Parser)]
#[command(name = "cfsync")]
#[command(author, version, about = "Keep EC2 security groups in sync with CloudFront IP ranges")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML config file (default: read AWS_REGION, INGRESS_PORT_LIST, ... from the environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Quiet mode (for cron/scheduled jobs)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile security group rules with the current CloudFront ranges
    Sync {
        /// Dry-run mode: read and compute changes but don't apply them
        #[arg(long)]
        dry_run: bool,

        /// Output format for the change summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the changes a sync would make
    Plan {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the CloudFront CIDR ranges currently published
    Ranges {
        /// IP ranges document URL
        #[arg(long, default_value = AWS_IP_RANGES_URL)]
        url: String,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
