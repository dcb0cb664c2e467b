//! Projects: the namespace every other resource lives in

use super::ResourceHandler;
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
struct ProjectRequest<'a> {
    name: &'a str,
}

pub struct ProjectHandler;

#[async_trait]
impl ResourceHandler for ProjectHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Project
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let body = ProjectRequest {
            name: &desired.name,
        };
        client.create_unit(self.kind(), &desired.name, &body).await?;

        // the project name doubles as its identifier
        Ok(ResourceState::new(&desired.name, desired))
    }

    async fn update(
        &self,
        client: &FaxterClient,
        state: &mut ResourceState,
        desired: &ResourceConfig,
    ) -> Result<()> {
        let body = ProjectRequest {
            name: &desired.name,
        };
        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}
