//! Servers
//!
//! Server creation is asynchronous on the backend: the create call returns
//! the server name immediately and the instance comes online later. The
//! handler waits for it with [`Reconciler`] before recording any state.

use super::{ResourceHandler, ResourceResponse, applied_args, changed, parse_args};
use crate::client::FaxterClient;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use faxter_cloud::state::{ATTR_IP_ADDRESSES, ATTR_REQUEST_FLOATING_IP};
use faxter_cloud::{
    FetchError, PollConfig, ProvisioningHandle, Reconciler, ResourceConfig, ResourceKind,
    ResourceState, ResourceStatus, StatusFetch, StatusReport,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

fn default_flavor() -> String {
    "copper".to_string()
}

fn default_image() -> String {
    "Ubuntu2204".to_string()
}

fn default_security_groups() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_networks() -> Vec<String> {
    vec!["public1".to_string()]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerArgs {
    pub key_name: String,

    #[serde(default = "default_flavor")]
    pub flavor: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_security_groups")]
    pub security_groups: Vec<String>,

    #[serde(default)]
    pub request_floating_ip: bool,

    #[serde(default)]
    pub cloud_init: String,

    #[serde(default = "default_networks")]
    pub networks: Vec<String>,

    #[serde(default)]
    pub sub_networks: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ServerCreateRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    project: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    flavor: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    image: &'a str,
    key_name: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    security_groups: &'a [String],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    request_floating_ip: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    cloud_init: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    networks: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    sub_networks: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    volumes: &'a [String],
}

/// Only `name` is always sent; other fields are included when they changed
#[derive(Debug, Default, Serialize, PartialEq)]
pub(crate) struct ServerUpdateRequest {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_floating_ip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    networks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "subnetworks")]
    sub_networks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volumes: Option<Vec<String>>,
}

impl ServerUpdateRequest {
    pub(crate) fn diff(name: &str, old: Option<&ServerArgs>, new: &ServerArgs) -> Self {
        Self {
            name: name.to_string(),
            flavor: changed(old.map(|o| &o.flavor), &new.flavor),
            image: changed(old.map(|o| &o.image), &new.image),
            security_groups: changed(old.map(|o| &o.security_groups), &new.security_groups),
            request_floating_ip: changed(
                old.map(|o| &o.request_floating_ip),
                &new.request_floating_ip,
            ),
            networks: changed(old.map(|o| &o.networks), &new.networks),
            sub_networks: changed(old.map(|o| &o.sub_networks), &new.sub_networks),
            volumes: changed(old.map(|o| &o.volumes), &new.volumes),
        }
    }
}

/// Status query for one server, handed to the reconciler
pub struct ServerStatusFetch<'a> {
    client: &'a FaxterClient,
    project: &'a str,
}

impl<'a> ServerStatusFetch<'a> {
    pub fn new(client: &'a FaxterClient, project: &'a str) -> Self {
        Self { client, project }
    }
}

#[async_trait]
impl StatusFetch for ServerStatusFetch<'_> {
    async fn fetch(&self, handle: &ProvisioningHandle) -> std::result::Result<StatusReport, FetchError> {
        match get_server(self.client, handle.as_str(), self.project).await {
            Ok(server) => Ok(StatusReport::new(server.status, server.properties.ip_addresses)
                .with_floating_ip(server.properties.request_floating_ip)),
            Err(e) if e.is_not_found() => Err(FetchError::NotFound),
            Err(e) => Err(FetchError::Other(e.to_string())),
        }
    }
}

async fn get_server(client: &FaxterClient, name: &str, project: &str) -> Result<ResourceResponse> {
    client.read(ResourceKind::Server, name, project).await
}

pub struct ServerHandler {
    poll: PollConfig,
}

impl ServerHandler {
    pub fn new(poll: PollConfig) -> Self {
        Self { poll }
    }
}

#[async_trait]
impl ResourceHandler for ServerHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Server
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: ServerArgs = parse_args(desired)?;
        let body = ServerCreateRequest {
            project: &desired.project,
            name: &desired.name,
            flavor: &args.flavor,
            image: &args.image,
            key_name: &args.key_name,
            security_groups: &args.security_groups,
            request_floating_ip: args.request_floating_ip,
            cloud_init: &args.cloud_init,
            networks: &args.networks,
            sub_networks: &args.sub_networks,
            volumes: &args.volumes,
        };

        let created: Vec<ResourceResponse> = client.create(self.kind(), &desired.name, &body).await?;
        let first = created
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::EmptyResponse("server".to_string()))?;
        let handle = ProvisioningHandle::new(first.name)?;

        tracing::info!(
            server = %handle,
            project = %desired.project,
            initial_status = %first.status,
            "Server submitted, waiting for it to come online"
        );

        let fetch = ServerStatusFetch::new(client, &desired.project);
        let result = Reconciler::new(self.poll)
            .reconcile(&handle, &fetch, cancel)
            .await?;

        let mut state = ResourceState::new(handle.as_str(), desired);
        state.apply_provisioning(&result);
        Ok(state)
    }

    async fn read(&self, client: &FaxterClient, state: &mut ResourceState) -> Result<()> {
        let server = get_server(client, &state.id, &state.project).await?;
        state.record_status(&server.status);
        state.set_attribute(ATTR_IP_ADDRESSES, serde_json::json!(server.properties.ip_addresses));
        state.set_attribute(
            ATTR_REQUEST_FLOATING_IP,
            serde_json::json!(server.properties.request_floating_ip),
        );
        if state.status == ResourceStatus::Error {
            tracing::warn!(server = %state.id, "Server reports an error state");
        }
        Ok(())
    }

    async fn update(
        &self,
        client: &FaxterClient,
        state: &mut ResourceState,
        desired: &ResourceConfig,
    ) -> Result<()> {
        let args: ServerArgs = parse_args(desired)?;
        let previous: Option<ServerArgs> = applied_args(state);
        let body = ServerUpdateRequest::diff(&desired.name, previous.as_ref(), &args);

        client
            .update(self.kind(), &state.id, &state.project, &body)
            .await?;
        state.set_config(desired);
        Ok(())
    }
}
