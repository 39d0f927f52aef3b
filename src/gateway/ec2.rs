//! EC2 security group backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::types::{IpPermission, IpRange};
use aws_sdk_ec2::Client;
use tracing::debug;

use super::{IngressPermission, SecurityGroupApi};

/// Security groups through the EC2 API
pub struct Ec2Api {
    client: Client,
}

impl Ec2Api {
    /// Build a client for `region` from the default credential chain
    pub async fn connect(region: &str) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        debug!("EC2 client ready for region {}", region);
        Self {
            client: Client::new(&shared),
        }
    }
}

#[async_trait]
impl SecurityGroupApi for Ec2Api {
    async fn describe_ingress(&self, group_id: &str) -> Result<Vec<IngressPermission>> {
        let output = self
            .client
            .describe_security_groups()
            .group_ids(group_id)
            .send()
            .await
            .with_context(|| format!("DescribeSecurityGroups failed for {}", group_id))?;

        let group = output
            .security_groups()
            .first()
            .with_context(|| format!("Security group {} not found", group_id))?;

        Ok(group.ip_permissions().iter().map(from_sdk).collect())
    }

    async fn revoke_ingress(&self, group_id: &str, permissions: &[IngressPermission]) -> Result<()> {
        self.client
            .revoke_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(permissions.iter().map(to_sdk).collect()))
            .send()
            .await
            .with_context(|| format!("RevokeSecurityGroupIngress failed for {}", group_id))?;
        Ok(())
    }

    async fn authorize_ingress(
        &self,
        group_id: &str,
        permissions: &[IngressPermission],
    ) -> Result<()> {
        self.client
            .authorize_security_group_ingress()
            .group_id(group_id)
            .set_ip_permissions(Some(permissions.iter().map(to_sdk).collect()))
            .send()
            .await
            .with_context(|| format!("AuthorizeSecurityGroupIngress failed for {}", group_id))?;
        Ok(())
    }
}

fn from_sdk(permission: &IpPermission) -> IngressPermission {
    IngressPermission {
        protocol: permission.ip_protocol().unwrap_or_default().to_string(),
        from_port: permission.from_port(),
        to_port: permission.to_port(),
        cidrs: permission
            .ip_ranges()
            .iter()
            .filter_map(|range| range.cidr_ip())
            .map(str::to_string)
            .collect(),
    }
}

fn to_sdk(permission: &IngressPermission) -> IpPermission {
    let ranges = permission
        .cidrs
        .iter()
        .map(|cidr| IpRange::builder().cidr_ip(cidr).build())
        .collect();

    IpPermission::builder()
        .ip_protocol(&permission.protocol)
        .set_from_port(permission.from_port)
        .set_to_port(permission.to_port)
        .set_ip_ranges(Some(ranges))
        .build()
}
