//! Security group access: backend abstraction and the managed-rule view over it.

mod ec2;

use anyhow::Result;
use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

pub use ec2::Ec2Api;

use crate::error::SyncError;
use crate::rule::{Rule, INGRESS_PROTOCOL};

/// One ingress permission as the backend reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressPermission {
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub cidrs: Vec<String>,
}

impl IngressPermission {
    /// Permission granting a single rule
    pub fn from_rule(rule: &Rule) -> Self {
        let port = i32::from(rule.port);
        Self {
            protocol: INGRESS_PROTOCOL.to_string(),
            from_port: Some(port),
            to_port: Some(port),
            cidrs: vec![rule.cidr.to_string()],
        }
    }

    /// The managed port of this permission, if it is a single-port TCP permission
    fn managed_port(&self, ports: &[u16]) -> Option<u16> {
        if self.protocol != INGRESS_PROTOCOL || self.from_port != self.to_port {
            return None;
        }
        let port = u16::try_from(self.from_port?).ok()?;
        ports.contains(&port).then_some(port)
    }
}

/// Trait for security group backends
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecurityGroupApi: Send + Sync {
    /// List every ingress permission of a security group
    async fn describe_ingress(&self, group_id: &str) -> Result<Vec<IngressPermission>>;

    /// Revoke the given ingress permissions
    async fn revoke_ingress(&self, group_id: &str, permissions: &[IngressPermission]) -> Result<()>;

    /// Authorize the given ingress permissions
    async fn authorize_ingress(
        &self,
        group_id: &str,
        permissions: &[IngressPermission],
    ) -> Result<()>;
}

/// Extract the managed rules from a list of permissions.
///
/// Only TCP single-port permissions on a managed port count. Everything else
/// (other protocols, port ranges, other ports) is invisible to the reconciler.
pub fn managed_rules(permissions: &[IngressPermission], ports: &[u16]) -> BTreeSet<Rule> {
    let mut rules = BTreeSet::new();
    for permission in permissions {
        let Some(port) = permission.managed_port(ports) else {
            continue;
        };
        for cidr in &permission.cidrs {
            match cidr.parse::<Ipv4Net>() {
                Ok(net) => {
                    rules.insert(Rule::new(net, port));
                }
                Err(_) => warn!("Ignoring unparseable CIDR {} on port {}", cidr, port),
            }
        }
    }
    rules
}

/// Reconciler-facing view of the security groups.
///
/// In dry-run mode every read happens and every change is logged, but the
/// backend is never asked to mutate anything.
pub struct Gateway {
    api: Arc<dyn SecurityGroupApi>,
    dry_run: bool,
}

impl Gateway {
    pub fn new(api: Arc<dyn SecurityGroupApi>, dry_run: bool) -> Self {
        Self { api, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Current managed rules of a security group
    pub async fn list_rules(
        &self,
        group_id: &str,
        ports: &[u16],
    ) -> Result<BTreeSet<Rule>, SyncError> {
        let permissions = self
            .api
            .describe_ingress(group_id)
            .await
            .map_err(|e| SyncError::BackendQuery {
                group_id: group_id.to_string(),
                message: format!("{:#}", e),
            })?;

        let rules = managed_rules(&permissions, ports);
        debug!(
            "{}: {} permissions, {} managed rules",
            group_id,
            permissions.len(),
            rules.len()
        );
        Ok(rules)
    }

    /// Revoke exactly the given rules
    pub async fn remove_rules(&self, group_id: &str, rules: &BTreeSet<Rule>) -> Result<(), SyncError> {
        if rules.is_empty() {
            return Ok(());
        }

        for rule in rules {
            info!("Deleted: [{}] from [{}]", rule, group_id);
        }

        if self.dry_run {
            return Ok(());
        }

        self.api
            .revoke_ingress(group_id, &to_permissions(rules))
            .await
            .map_err(|e| SyncError::BackendMutation {
                group_id: group_id.to_string(),
                message: format!("{:#}", e),
            })
    }

    /// Authorize exactly the given rules
    pub async fn add_rules(&self, group_id: &str, rules: &BTreeSet<Rule>) -> Result<(), SyncError> {
        if rules.is_empty() {
            return Ok(());
        }

        for rule in rules {
            info!("Added: [{}] to [{}]", rule, group_id);
        }

        if self.dry_run {
            return Ok(());
        }

        self.api
            .authorize_ingress(group_id, &to_permissions(rules))
            .await
            .map_err(|e| SyncError::BackendMutation {
                group_id: group_id.to_string(),
                message: format!("{:#}", e),
            })
    }
}

/// One permission per rule, never batching CIDRs
fn to_permissions(rules: &BTreeSet<Rule>) -> Vec<IngressPermission> {
    rules.iter().map(IngressPermission::from_rule).collect()
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory security groups for testing
    #[derive(Default)]
    pub struct InMemoryApi {
        pub groups: Mutex<BTreeMap<String, Vec<IngressPermission>>>,
        pub mutation_calls: Mutex<usize>,
    }

    impl InMemoryApi {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a group holding the given permissions
        pub fn with_group(self, group_id: &str, permissions: Vec<IngressPermission>) -> Self {
            self.groups
                .lock()
                .unwrap()
                .insert(group_id.to_string(), permissions);
            self
        }

        /// Add a group holding single-port TCP rules
        pub fn with_rules(self, group_id: &str, rules: &[Rule]) -> Self {
            let permissions = rules.iter().map(IngressPermission::from_rule).collect();
            self.with_group(group_id, permissions)
        }

        pub fn permissions(&self, group_id: &str) -> Vec<IngressPermission> {
            self.groups
                .lock()
                .unwrap()
                .get(group_id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn mutation_calls(&self) -> usize {
            *self.mutation_calls.lock().unwrap()
        }
    }

    fn same_grant(a: &IngressPermission, b: &IngressPermission) -> bool {
        a.protocol == b.protocol && a.from_port == b.from_port && a.to_port == b.to_port
    }

    #[async_trait]
    impl SecurityGroupApi for InMemoryApi {
        async fn describe_ingress(&self, group_id: &str) -> Result<Vec<IngressPermission>> {
            self.groups
                .lock()
                .unwrap()
                .get(group_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("InvalidGroup.NotFound: {}", group_id))
        }

        async fn revoke_ingress(&self, group_id: &str, permissions: &[IngressPermission]) -> Result<()> {
            *self.mutation_calls.lock().unwrap() += 1;
            let mut groups = self.groups.lock().unwrap();
            let existing = groups
                .get_mut(group_id)
                .ok_or_else(|| anyhow::anyhow!("InvalidGroup.NotFound: {}", group_id))?;

            for revoke in permissions {
                for held in existing.iter_mut().filter(|held| same_grant(held, revoke)) {
                    held.cidrs.retain(|cidr| !revoke.cidrs.contains(cidr));
                }
            }
            existing.retain(|held| !held.cidrs.is_empty());
            Ok(())
        }

        async fn authorize_ingress(
            &self,
            group_id: &str,
            permissions: &[IngressPermission],
        ) -> Result<()> {
            *self.mutation_calls.lock().unwrap() += 1;
            let mut groups = self.groups.lock().unwrap();
            let existing = groups
                .get_mut(group_id)
                .ok_or_else(|| anyhow::anyhow!("InvalidGroup.NotFound: {}", group_id))?;
            existing.extend(permissions.iter().cloned());
            Ok(())
        }
    }
}
