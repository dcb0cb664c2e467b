//! Per-type create/read/update/delete handlers
//!
//! Each handler turns a [`ResourceConfig`] into API calls and keeps the
//! matching [`ResourceState`] current. Argument defaults mirror what the
//! API applies when a field is left out.

use crate::client::FaxterClient;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use faxter_cloud::{PollConfig, ResourceConfig, ResourceKind, ResourceState};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

pub mod load_balancer;
pub mod network;
pub mod project;
pub mod router;
pub mod security_group;
pub mod server;
pub mod ssh_key;
pub mod volume;

pub use load_balancer::LoadBalancerHandler;
pub use network::NetworkHandler;
pub use project::ProjectHandler;
pub use router::RouterHandler;
pub use security_group::SecurityGroupHandler;
pub use server::{ServerHandler, ServerStatusFetch};
pub use ssh_key::SshKeyHandler;
pub use volume::VolumeHandler;

/// Lifecycle operations for one resource type
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Create the resource and return its initial state
    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        cancel: &CancellationToken,
    ) -> Result<ResourceState>;

    /// Refresh computed attributes; `ApiError::NotFound` means the resource is gone
    async fn read(&self, client: &FaxterClient, state: &mut ResourceState) -> Result<()> {
        client.exists(self.kind(), &state.id, &state.project).await
    }

    /// Push changed arguments to the backend
    async fn update(
        &self,
        client: &FaxterClient,
        state: &mut ResourceState,
        desired: &ResourceConfig,
    ) -> Result<()>;

    async fn delete(&self, client: &FaxterClient, state: &ResourceState) -> Result<()> {
        client.delete(self.kind(), &state.id, &state.project).await
    }
}

/// Pick the handler for `kind`
pub fn handler_for(kind: ResourceKind, poll: PollConfig) -> Box<dyn ResourceHandler> {
    match kind {
        ResourceKind::Project => Box::new(ProjectHandler),
        ResourceKind::SshKey => Box::new(SshKeyHandler),
        ResourceKind::SecurityGroup => Box::new(SecurityGroupHandler),
        ResourceKind::Network => Box::new(NetworkHandler),
        ResourceKind::Router => Box::new(RouterHandler),
        ResourceKind::Volume => Box::new(VolumeHandler),
        ResourceKind::Server => Box::new(ServerHandler::new(poll)),
        ResourceKind::LoadBalancer => Box::new(LoadBalancerHandler),
    }
}

/// Deserialize the type-specific arguments of a resource
pub(crate) fn parse_args<T: DeserializeOwned>(resource: &ResourceConfig) -> Result<T> {
    serde_json::from_value(resource.config.clone()).map_err(|e| ApiError::InvalidConfig {
        address: resource.address(),
        message: e.to_string(),
    })
}

/// Arguments last applied to a resource, as recorded in state
pub(crate) fn applied_args<T: DeserializeOwned>(state: &ResourceState) -> Option<T> {
    serde_json::from_value(state.config.clone()).ok()
}

/// Common response body for single resources
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceResponse {
    pub name: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub properties: ResourceProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceProperties {
    #[serde(default)]
    pub ip_addresses: Vec<String>,

    #[serde(default)]
    pub request_floating_ip: bool,
}

/// `Some(new)` when the value changed since the last apply
pub(crate) fn changed<T: PartialEq + Clone>(old: Option<&T>, new: &T) -> Option<T> {
    match old {
        Some(old) if old == new => None,
        _ => Some(new.clone()),
    }
}
