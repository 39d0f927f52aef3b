//! Change notifications to a Slack-compatible incoming webhook.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::SlackConfig;
use crate::error::SyncError;
use crate::reconciler::ChangeSet;
use crate::rule::Rule;

/// Timeout for webhook requests
const TIMEOUT_SECS: u64 = 30;

const MESSAGE_HEADER: &str =
    "The following CIDR range updates have been applied to CloudFront associated security groups:";

/// Destination for change summaries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report the applied changes
    async fn notify(&self, changes: &[ChangeSet]) -> Result<(), SyncError>;
}

/// Webhook payload
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SlackPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Posts change summaries to a Slack incoming webhook
pub struct SlackNotifier {
    config: SlackConfig,
    client: Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client for notifications")?;

        Ok(Self { config, client })
    }

    /// Build a notifier when a webhook is configured
    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }
        Self::new(config.clone()).map(Some)
    }

    pub fn payload(&self, changes: &[ChangeSet]) -> SlackPayload {
        build_payload(&self.config, changes)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, changes: &[ChangeSet]) -> Result<(), SyncError> {
        let payload = self.payload(changes);

        let response = self
            .client
            .post(self.config.webhook_url.as_str())
            .json(&payload)
            .send()
            .await
            // Strip the URL, it carries the webhook credential
            .map_err(|e| SyncError::Notification(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Notification(format!(
                "Webhook returned {}",
                response.status()
            )));
        }

        debug!("Slack notification sent");
        Ok(())
    }
}

/// Assemble the webhook payload for a set of changes
pub fn build_payload(config: &SlackConfig, changes: &[ChangeSet]) -> SlackPayload {
    SlackPayload {
        text: build_message(changes),
        channel: config.channel.as_ref().map(|c| format!("#{}", c)),
        icon_emoji: config.emoji.as_ref().map(|e| format!(":{}:", e)),
        username: config.username.clone(),
    }
}

/// Message text: header, then one preformatted section for removals and one for additions
pub fn build_message(changes: &[ChangeSet]) -> String {
    let mut removed = String::new();
    let mut added = String::new();
    for change in changes {
        removed.push_str(&group_section("Removed from", &change.group_id, &change.removed));
        added.push_str(&group_section("Added to", &change.group_id, &change.added));
    }

    format!(
        "{}{}{}",
        MESSAGE_HEADER,
        code_block(&removed),
        code_block(&added)
    )
}

fn group_section(action: &str, group_id: &str, rules: &BTreeSet<Rule>) -> String {
    if rules.is_empty() {
        return String::new();
    }

    let mut text = format!("{} [{}]:\n", action, group_id);
    for rule in rules {
        text.push_str(&format!("- {}\n", rule));
    }
    text.push('\n');
    text
}

fn code_block(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("\n```{}```\n", text.trim_matches('\n'))
}
