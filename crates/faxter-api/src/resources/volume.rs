//! Block storage volumes

use super::{ResourceHandler, ResourceResponse, parse_args};
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeArgs {
    /// Size in GB
    pub storage: u32,
}

#[derive(Debug, Serialize)]
struct VolumeCreateRequest<'a> {
    project: &'a str,
    name: &'a str,
    storage: u32,
}

#[derive(Debug, Serialize)]
struct VolumeUpdateRequest<'a> {
    project: &'a str,
    storage: u32,
}

pub struct VolumeHandler;

#[async_trait]
impl ResourceHandler for VolumeHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Volume
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: VolumeArgs = parse_args(desired)?;
        let body = VolumeCreateRequest {
            project: &desired.project,
            name: &desired.name,
            storage: args.storage,
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
        let args: VolumeArgs = parse_args(desired)?;
        let body = VolumeUpdateRequest {
            project: &desired.project,
            storage: args.storage,
        };
        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}
