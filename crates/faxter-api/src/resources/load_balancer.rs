//! Load balancers in front of a fixed set of backend servers

use super::{ResourceHandler, ResourceResponse, applied_args, changed, parse_args};
use crate::client::FaxterClient;
use crate::error::Result;
use async_trait::async_trait;
use faxter_cloud::{ResourceConfig, ResourceKind, ResourceState};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

fn default_port() -> u16 {
    80
}

fn default_endpoint() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backend {
    pub ip: String,
    pub port: u16,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadBalancerArgs {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default)]
    pub sub_networks: Vec<String>,

    #[serde(default)]
    pub key_name: String,

    #[serde(default = "default_true")]
    pub request_floating_ip: bool,

    #[serde(default)]
    pub ssl_enabled: bool,

    pub servers: Vec<Backend>,

    #[serde(default)]
    pub security_groups: Vec<String>,
}

#[derive(Debug, Serialize)]
struct LoadBalancerCreateRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    project: &'a str,
    name: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    networks: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    sub_networks: &'a [String],
    #[serde(skip_serializing_if = "str::is_empty")]
    key_name: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    request_floating_ip: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    ssl_enabled: bool,
    servers: &'a [Backend],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    security_groups: &'a [String],
}

#[derive(Debug, Default, Serialize, PartialEq)]
struct LoadBalancerUpdateRequest {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    networks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_networks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_floating_ip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssl_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    servers: Option<Vec<Backend>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_groups: Option<Vec<String>>,
}

impl LoadBalancerUpdateRequest {
    fn diff(name: &str, old: Option<&LoadBalancerArgs>, new: &LoadBalancerArgs) -> Self {
        Self {
            name: name.to_string(),
            port: changed(old.map(|o| &o.port), &new.port),
            networks: changed(old.map(|o| &o.networks), &new.networks),
            sub_networks: changed(old.map(|o| &o.sub_networks), &new.sub_networks),
            key_name: changed(old.map(|o| &o.key_name), &new.key_name),
            request_floating_ip: changed(
                old.map(|o| &o.request_floating_ip),
                &new.request_floating_ip,
            ),
            ssl_enabled: changed(old.map(|o| &o.ssl_enabled), &new.ssl_enabled),
            servers: changed(old.map(|o| &o.servers), &new.servers),
            security_groups: changed(old.map(|o| &o.security_groups), &new.security_groups),
        }
    }
}

pub struct LoadBalancerHandler;

#[async_trait]
impl ResourceHandler for LoadBalancerHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::LoadBalancer
    }

    async fn create(
        &self,
        client: &FaxterClient,
        desired: &ResourceConfig,
        _cancel: &CancellationToken,
    ) -> Result<ResourceState> {
        let args: LoadBalancerArgs = parse_args(desired)?;
        let body = LoadBalancerCreateRequest {
            project: &desired.project,
            name: &desired.name,
            port: args.port,
            networks: &args.networks,
            sub_networks: &args.sub_networks,
            key_name: &args.key_name,
            request_floating_ip: args.request_floating_ip,
            ssl_enabled: args.ssl_enabled,
            servers: &args.servers,
            security_groups: &args.security_groups,
        };
        let created: ResourceResponse = client.create(self.kind(), &desired.name, &body).await?;

        let mut state = ResourceState::new(created.name, desired);
        state.record_status(&created.status);
        Ok(state)
    }

    async fn read(&self, client: &FaxterClient, state: &mut ResourceState) -> Result<()> {
        let lb: ResourceResponse = client.read(self.kind(), &state.id, &state.project).await?;
        state.record_status(&lb.status);
        Ok(())
    }

    async fn update(
        &self,
        client: &FaxterClient,
        state: &mut ResourceState,
        desired: &ResourceConfig,
    ) -> Result<()> {
        let args: LoadBalancerArgs = parse_args(desired)?;
        let previous: Option<LoadBalancerArgs> = applied_args(state);
        let body = LoadBalancerUpdateRequest::diff(&desired.name, previous.as_ref(), &args);

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

    fn args(config: serde_json::Value) -> LoadBalancerArgs {
        let resource = ResourceConfig::new(ResourceKind::LoadBalancer, "front", config);
        parse_args(&resource).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = args(json!({"servers": [{"ip": "10.0.0.5", "port": 8080}]}));
        assert_eq!(args.port, 80);
        assert!(args.request_floating_ip);
        assert!(!args.ssl_enabled);
        assert_eq!(args.servers[0].endpoint, "/");
    }

    #[test]
    fn test_servers_required() {
        let resource = ResourceConfig::new(ResourceKind::LoadBalancer, "front", json!({"port": 443}));
        assert!(parse_args::<LoadBalancerArgs>(&resource).is_err());
    }

    #[test]
    fn test_update_diff() {
        let old = args(json!({"servers": [{"ip": "10.0.0.5", "port": 8080}]}));
        let new = args(json!({"servers": [{"ip": "10.0.0.5", "port": 8080}], "ssl_enabled": true}));

        let body = serde_json::to_value(LoadBalancerUpdateRequest::diff("front", Some(&old), &new)).unwrap();
        assert_eq!(body, json!({"name": "front", "ssl_enabled": true}));
    }
}
