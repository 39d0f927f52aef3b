//! Plan command implementation.
//!
//! Computes the changes a sync would make without touching any group.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::feed::{Fetcher, RangeSource};
use crate::gateway::{Ec2Api, Gateway};
use crate::reconciler::{observe, plan, ChangeSet};
use crate::rule::desired_rules;

/// Run the plan command
pub async fn run(config: Config, format: OutputFormat) -> Result<()> {
    let fetcher = Fetcher::new(&config.feed_url)?;
    let api = Ec2Api::connect(&config.region).await;
    // Plan only reads; the gateway is never asked to write
    let gateway = Gateway::new(Arc::new(api), true);

    let changes = compute(&config, &fetcher, &gateway).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
        OutputFormat::Text => print!("{}", render(&changes)),
    }

    Ok(())
}

/// Fetch, observe and plan without applying
pub async fn compute(
    config: &Config,
    source: &dyn RangeSource,
    gateway: &Gateway,
) -> Result<Vec<ChangeSet>> {
    let cidrs = source.fetch().await?;
    let desired = desired_rules(&cidrs, &config.ports);
    let observed = observe(gateway, &config.security_groups, &config.ports).await?;
    let changes = plan(&desired, observed);

    let pending = changes.iter().filter(|c| !c.is_empty()).count();
    info!(
        "{} desired rules, {} of {} groups need changes",
        desired.len(),
        pending,
        changes.len()
    );
    Ok(changes)
}

/// Human-readable plan, one block per group
pub fn render(changes: &[ChangeSet]) -> String {
    let mut out = String::new();
    for change in changes {
        out.push_str(&format!(
            "{} ({} rules after sync)\n",
            change.group_id, change.rule_count
        ));
        if change.is_empty() {
            out.push_str("  up to date\n");
        }
        for rule in &change.removed {
            out.push_str(&format!("  - {}\n", rule));
        }
        for rule in &change.added {
            out.push_str(&format!("  + {}\n", rule));
        }
    }
    out
}
