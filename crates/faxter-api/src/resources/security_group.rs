//! Security groups and their firewall rules

use super::{ResourceHandler, ResourceResponse, parse_args};
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_direction() -> String {
    "ingress".to_string()
}

fn default_remote_ip_prefix() -> String {
    "0.0.0.0/0".to_string()
}

fn default_ether_type() -> String {
    "IPv4".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityRule {
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,

    #[serde(default = "default_direction")]
    pub direction: String,

    #[serde(default = "default_remote_ip_prefix")]
    pub remote_ip_prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,

    #[serde(default = "default_ether_type")]
    pub ether_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityGroupArgs {
    #[serde(default)]
    pub rules: Vec<SecurityRule>,
}

#[derive(Debug, Serialize)]
struct SecurityGroupRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    project: &'a str,
    name: &'a str,
    rules: &'a [SecurityRule],
}

pub struct SecurityGroupHandler;

#[async_trait]
impl ResourceHandler for SecurityGroupHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SecurityGroup
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: SecurityGroupArgs = parse_args(desired)?;
        let body = SecurityGroupRequest {
            project: &desired.project,
            name: &desired.name,
            rules: &args.rules,
        };
        let created: ResourceResponse = client.create(self.kind(), &desired.name, &body).await?;
        Ok(ResourceState::new(created.name, desired))
    }

    async fn update(
        &self,
        client: &FaxterClient,
        state: &mut ResourceState,
        desired: &ResourceConfig,
    ) -> Result<()> {
        let args: SecurityGroupArgs = parse_args(desired)?;
        let body = SecurityGroupRequest {
            project: &desired.project,
            name: &desired.name,
            rules: &args.rules,
        };
        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}
