//! # cfsync - CloudFront security group synchronizer
//!
//! Keeps the ingress rules of a fixed list of EC2 security groups in line with
//! the CloudFront ranges published in AWS's `ip-ranges.json`, so that only
//! current CloudFront edges reach the managed ports.
//!
//! ## Features
//!
//! - **Minimal changes** - Only orphaned rules are revoked and only missing rules are authorized
//! - **Balanced groups** - New rules go to the least loaded group, keeping each under the EC2 rule cap
//! - **Non-Intrusive** - UDP, port-range and unmanaged-port rules are never touched
//! - **Idempotent** - Safe to run on a schedule; a second run with the same feed does nothing
//! - **Dry run** - Every read and every computed change, no writes
//! - **Notifications** - Slack-compatible webhook summary of applied changes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        cfsync                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: sync, plan, ranges                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (environment or serde_yaml)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Feed (reqwest + rustls)                                    │
//! │    └── ip-ranges.json -> CLOUDFRONT IPv4 CIDRs              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Reconciler                                                 │
//! │    └── orphan removal, least-loaded gap assignment          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Gateway (SecurityGroupApi trait)                           │
//! │    └── Ec2Api (aws-sdk-ec2)                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Notifier (Slack webhook)                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cfsync::config::Config;
//! use cfsync::feed::{Fetcher, RangeSource};
//! use cfsync::gateway::{Ec2Api, Gateway};
//! use cfsync::reconciler::reconcile;
//! use cfsync::rule::desired_rules;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!
//!     let cidrs = Fetcher::new(&config.feed_url)?.fetch().await?;
//!     let desired = desired_rules(&cidrs, &config.ports);
//!
//!     let gateway = Gateway::new(Arc::new(Ec2Api::connect(&config.region).await), config.dry_run);
//!     let report = reconcile(&gateway, &desired, &config.security_groups, &config.ports).await?;
//!
//!     println!("changed: {}", report.update_applied);
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! A pass runs sequentially on one thread and keeps no state between runs.
//! Nothing prevents two passes from racing on the same groups; schedule them
//! so they never overlap.
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error kinds of a pass
//! - [`feed`] - HTTP client for the AWS IP range feed
//! - [`gateway`] - Security group backend abstraction (EC2)
//! - [`notifier`] - Slack webhook notifications
//! - [`reconciler`] - Change planning and application
//! - [`rule`] - The (CIDR, port) rule model

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod notifier;
pub mod reconciler;
pub mod rule;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::SyncError;
