//! Sync command implementation.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::SyncError;
use crate::feed::{Fetcher, RangeSource};
use crate::gateway::{Ec2Api, Gateway};
use crate::notifier::{Notifier, SlackNotifier};
use crate::reconciler::{reconcile, ChangeSet, ReconcileReport};
use crate::rule::desired_rules;

/// Machine-readable summary of a pass
#[derive(Debug, Serialize)]
pub struct SyncSummary<'a> {
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub update_applied: bool,
    pub groups: &'a [ChangeSet],
}

/// Run the sync command
pub async fn run(config: Config, dry_run: bool, format: OutputFormat) -> Result<()> {
    let config = Config {
        dry_run: config.dry_run || dry_run,
        ..config
    };

    let fetcher = Fetcher::new(&config.feed_url)?;
    let api = Ec2Api::connect(&config.region).await;
    let gateway = Gateway::new(Arc::new(api), config.dry_run);
    let notifier = SlackNotifier::from_config(&config.slack)?;

    let report = execute(
        &config,
        &fetcher,
        &gateway,
        notifier.as_ref().map(|n| n as &dyn Notifier),
    )
    .await?;

    if format == OutputFormat::Json {
        let summary = SyncSummary {
            generated_at: Utc::now(),
            dry_run: report.dry_run,
            update_applied: report.update_applied,
            groups: &report.changes,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

/// One reconciliation pass: fetch, reconcile, notify.
///
/// Notification failures are logged and never fail the pass.
pub async fn execute(
    config: &Config,
    source: &dyn RangeSource,
    gateway: &Gateway,
    notifier: Option<&dyn Notifier>,
) -> Result<ReconcileReport, SyncError> {
    if gateway.is_dry_run() {
        info!("DRY RUN mode");
    }

    let cidrs = source.fetch().await?;
    if cidrs.is_empty() {
        warn!("Feed returned no qualifying ranges, every managed rule will be removed");
    }

    let desired = desired_rules(&cidrs, &config.ports);
    let report = reconcile(gateway, &desired, &config.security_groups, &config.ports)
        .await
        .inspect_err(|e| {
            if e.may_have_mutated() {
                warn!("Security groups may be partially updated, the next run will converge them");
            }
        })?;

    if report.update_applied {
        if let Some(notifier) = notifier {
            if let Err(e) = notifier.notify(&report.changes).await {
                error!("{}", e);
            }
        }
    }

    info!(
        "{}",
        if report.update_applied {
            "Updates applied"
        } else {
            "No work done"
        }
    );

    Ok(report)
}
