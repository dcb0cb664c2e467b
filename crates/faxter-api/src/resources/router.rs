//! Routers connecting subnets, optionally to the external network

use super::{ResourceHandler, ResourceResponse, parse_args};
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

fn default_connect_external() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterArgs {
    #[serde(default = "default_connect_external")]
    pub connect_external: bool,

    pub subnets: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RouterRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    project: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    connect_external: bool,
    subnets: &'a [String],
}

impl<'a> RouterRequest<'a> {
    fn new(desired: &'a ResourceConfig, args: &'a RouterArgs) -> Self {
        Self {
            project: &desired.project,
            name: &desired.name,
            connect_external: args.connect_external,
            subnets: &args.subnets,
        }
    }
}

pub struct RouterHandler;

#[async_trait]
impl ResourceHandler for RouterHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Router
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: RouterArgs = parse_args(desired)?;
        let body = RouterRequest::new(desired, &args);
        let created: ResourceResponse = client.create(self.kind(), &desired.name, &body).await?;
        Ok(ResourceState::new(created.name, desired))
    }

    async fn update(
        &self,
        client: &FaxterClient,
        state: &mut ResourceState,
        desired: &ResourceConfig,
    ) -> Result<()> {
        let args: RouterArgs = parse_args(desired)?;
        let body = RouterRequest::new(desired, &args);
        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_external_defaults_on() {
        let resource = ResourceConfig::new(
            ResourceKind::Router,
            "edge",
            json!({"subnets": ["app"]}),
        );
        let args: RouterArgs = parse_args(&resource).unwrap();
        assert!(args.connect_external);

        let body = serde_json::to_value(RouterRequest::new(&resource, &args)).unwrap();
        assert_eq!(
            body,
            json!({"project": "default", "name": "edge", "connect_external": true, "subnets": ["app"]})
        );
    }
}
