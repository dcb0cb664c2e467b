//! Private networks and their subnets

use super::{ResourceHandler, ResourceResponse, parse_args};
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subnet {
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkArgs {
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Serialize)]
struct NetworkRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    project: &'a str,
    name: &'a str,
    subnets: &'a [Subnet],
}

pub struct NetworkHandler;

#[async_trait]
impl ResourceHandler for NetworkHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Network
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: NetworkArgs = parse_args(desired)?;
        let body = NetworkRequest {
            project: &desired.project,
            name: &desired.name,
            subnets: &args.subnets,
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
        let args: NetworkArgs = parse_args(desired)?;
        let body = NetworkRequest {
            project: &desired.project,
            name: &desired.name,
            subnets: &args.subnets,
        };
        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}
