//! Rule reconciliation across security groups.
//!
//! A pass has three steps:
//!
//! 1. Observe every group. Rules outside the desired set are orphans and are
//!    scheduled for removal; everything observed counts as already present.
//! 2. Assign each desired rule present in no group to the group with the
//!    fewest rules (first in configured order on ties), one rule at a time.
//! 3. Apply removals then additions, group by group.
//!
//! All reads finish before the first write, so a failed read never leaves
//! a partially applied pass behind. A failed write does: groups already
//! changed stay changed, and the next run converges from there.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::gateway::Gateway;
use crate::rule::Rule;

/// Changes computed for one security group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub group_id: String,
    pub removed: BTreeSet<Rule>,
    pub added: BTreeSet<Rule>,
    /// Managed rules in the group once the changes are applied
    pub rule_count: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub changes: Vec<ChangeSet>,
    pub update_applied: bool,
    pub dry_run: bool,
}

/// Compute per-group changes from the observed rules of each group.
///
/// `observed` is in configured group order; the result keeps that order.
pub fn plan(desired: &BTreeSet<Rule>, observed: Vec<(String, BTreeSet<Rule>)>) -> Vec<ChangeSet> {
    let mut global_seen: BTreeSet<Rule> = BTreeSet::new();
    let mut changes = Vec::with_capacity(observed.len());

    for (group_id, actual) in observed {
        let removed: BTreeSet<Rule> = actual.difference(desired).copied().collect();
        let rule_count = actual.len() - removed.len();
        global_seen.extend(actual);
        changes.push(ChangeSet {
            group_id,
            removed,
            added: BTreeSet::new(),
            rule_count,
        });
    }

    for rule in desired.difference(&global_seen) {
        // min_by_key keeps the first of equal minimums
        let Some(target) = changes.iter_mut().min_by_key(|change| change.rule_count) else {
            break;
        };
        target.added.insert(*rule);
        target.rule_count += 1;
    }

    changes
}

/// Read the managed rules of every group, in order
pub async fn observe(
    gateway: &Gateway,
    group_ids: &[String],
    ports: &[u16],
) -> Result<Vec<(String, BTreeSet<Rule>)>, SyncError> {
    let mut observed = Vec::with_capacity(group_ids.len());
    for group_id in group_ids {
        let actual = gateway.list_rules(group_id, ports).await?;
        observed.push((group_id.clone(), actual));
    }
    Ok(observed)
}

/// Run a full pass: observe, plan, then apply through the gateway
pub async fn reconcile(
    gateway: &Gateway,
    desired: &BTreeSet<Rule>,
    group_ids: &[String],
    ports: &[u16],
) -> Result<ReconcileReport, SyncError> {
    let observed = observe(gateway, group_ids, ports).await?;
    let changes = plan(desired, observed);

    let mut update_applied = false;
    for change in &changes {
        debug!(
            "{}: -{} +{} -> {} rules",
            change.group_id,
            change.removed.len(),
            change.added.len(),
            change.rule_count
        );

        if !change.removed.is_empty() {
            gateway.remove_rules(&change.group_id, &change.removed).await?;
            update_applied = true;
        }

        if !change.added.is_empty() {
            gateway.add_rules(&change.group_id, &change.added).await?;
            update_applied = true;
        }
    }

    let removed: usize = changes.iter().map(|c| c.removed.len()).sum();
    let added: usize = changes.iter().map(|c| c.added.len()).sum();
    info!(
        "Reconciled {} groups: {} removed, {} added",
        changes.len(),
        removed,
        added
    );

    Ok(ReconcileReport {
        changes,
        update_applied,
        dry_run: gateway.is_dry_run(),
    })
}
