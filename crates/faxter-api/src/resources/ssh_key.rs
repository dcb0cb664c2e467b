//! SSH public keys injected into new servers

use super::{ResourceHandler, ResourceResponse, parse_args};
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshKeyArgs {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
struct SshKeyRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    project: &'a str,
    name: &'a str,
    public_key: &'a str,
}

pub struct SshKeyHandler;

#[async_trait]
impl ResourceHandler for SshKeyHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SshKey
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: SshKeyArgs = parse_args(desired)?;
        let body = SshKeyRequest {
            project: &desired.project,
            name: &desired.name,
            public_key: args.public_key.trim(),
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
        let args: SshKeyArgs = parse_args(desired)?;
        let body = SshKeyRequest {
            project: &desired.project,
            name: &desired.name,
            public_key: args.public_key.trim(),
        };
        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}
