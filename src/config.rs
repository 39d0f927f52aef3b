//! Configuration management for cfsync.
//!
//! Configuration comes either from environment variables (the default, suited
//! to scheduled jobs) or from a YAML file passed with `--config`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::feed::AWS_IP_RANGES_URL;

pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_PORTS: &str = "INGRESS_PORT_LIST";
pub const ENV_SECURITY_GROUPS: &str = "SECURITY_GROUP_ID_LIST";
pub const ENV_SLACK_WEBHOOK: &str = "SLACK_WEBHOOK_URI";
pub const ENV_SLACK_CHANNEL: &str = "SLACK_CHANNEL";
pub const ENV_SLACK_EMOJI: &str = "SLACK_EMOJI";
pub const ENV_SLACK_USERNAME: &str = "SLACK_USERNAME";
pub const ENV_DRY_RUN: &str = "DRY_RUN";
pub const ENV_FEED_URL: &str = "IP_RANGES_URL";

/// Secure string type that zeroizes memory on drop
/// Used for the webhook URL, which embeds its own credential
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AWS region of the security groups
    pub region: String,

    /// TCP ports opened to every CloudFront range
    pub ports: Vec<u16>,

    /// Security groups sharing the rules, in balancing order
    pub security_groups: Vec<String>,

    /// Compute and log changes without applying them
    pub dry_run: bool,

    /// Location of the AWS ip-ranges.json document
    pub feed_url: String,

    /// Change notifications
    pub slack: SlackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: String::new(),
            ports: Vec::new(),
            security_groups: Vec::new(),
            dry_run: false,
            feed_url: AWS_IP_RANGES_URL.to_string(),
            slack: SlackConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from a key lookup (environment-style keys)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let optional = |key: &str| Some(get(key)).filter(|v| !v.is_empty());

        let ports = split_list(&get(ENV_PORTS))
            .into_iter()
            .map(|p| {
                p.parse::<u16>()
                    .with_context(|| format!("Invalid port '{}' in {}", p, ENV_PORTS))
            })
            .collect::<Result<Vec<_>>>()?;

        let config = Config {
            region: get(ENV_REGION),
            ports,
            security_groups: split_list(&get(ENV_SECURITY_GROUPS)),
            dry_run: is_truthy(&get(ENV_DRY_RUN)),
            feed_url: optional(ENV_FEED_URL).unwrap_or_else(|| AWS_IP_RANGES_URL.to_string()),
            slack: SlackConfig {
                webhook_url: SecureString::new(get(ENV_SLACK_WEBHOOK)),
                channel: optional(ENV_SLACK_CHANNEL),
                emoji: optional(ENV_SLACK_EMOJI),
                username: optional(ENV_SLACK_USERNAME),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            anyhow::bail!("AWS region is not set ({})", ENV_REGION);
        }

        if self.ports.is_empty() {
            anyhow::bail!("No ingress ports configured ({})", ENV_PORTS);
        }

        if self.ports.contains(&0) {
            anyhow::bail!("Invalid ingress port 0");
        }

        if let Some(dup) = first_duplicate(&self.ports) {
            anyhow::bail!("Duplicate ingress port {}", dup);
        }

        if self.security_groups.is_empty() {
            anyhow::bail!("No security groups configured ({})", ENV_SECURITY_GROUPS);
        }

        if let Some(dup) = first_duplicate(&self.security_groups) {
            anyhow::bail!("Duplicate security group {}", dup);
        }

        if !self.feed_url.starts_with("https://") {
            anyhow::bail!("IP ranges URL must use HTTPS: {}", self.feed_url);
        }

        // The URL itself is a secret, keep it out of the message
        if self.slack.is_enabled() && !self.slack.webhook_url.as_str().starts_with("https://") {
            anyhow::bail!("Slack webhook URL must use HTTPS");
        }

        Ok(())
    }
}

/// Slack-compatible incoming webhook settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SlackConfig {
    /// Notifications are disabled when empty
    pub webhook_url: SecureString,
    /// Channel name without the leading '#'
    pub channel: Option<String>,
    /// Emoji name without the surrounding ':'
    pub emoji: Option<String>,
    pub username: Option<String>,
}

impl SlackConfig {
    pub fn is_enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }
}

/// Split a comma-separated value, trimming items and dropping empty ones
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn first_duplicate<T: Eq + std::hash::Hash + Clone>(items: &[T]) -> Option<T> {
    let mut seen = HashSet::new();
    items.iter().find(|item| !seen.insert(*item)).cloned()
}
