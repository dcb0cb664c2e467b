//! Desired resources and manifest loading

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Project used when a resource does not name one
pub const DEFAULT_PROJECT: &str = "default";

/// Resource types managed by the provider
///
/// Variants are declared in dependency order; `Ord` follows that order and
/// is what planning uses to sequence creations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    SshKey,
    SecurityGroup,
    Network,
    Router,
    Volume,
    Server,
    LoadBalancer,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Project,
        ResourceKind::SshKey,
        ResourceKind::SecurityGroup,
        ResourceKind::Network,
        ResourceKind::Router,
        ResourceKind::Volume,
        ResourceKind::Server,
        ResourceKind::LoadBalancer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::SshKey => "ssh_key",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::Network => "network",
            ResourceKind::Router => "router",
            ResourceKind::Volume => "volume",
            ResourceKind::Server => "server",
            ResourceKind::LoadBalancer => "load_balancer",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CloudError::UnknownResourceType(s.to_string()))
    }
}

/// Build the `kind.name` address identifying a resource
pub fn address(kind: ResourceKind, name: &str) -> String {
    format!("{}.{}", kind, name)
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// A single desired resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: ResourceKind,

    pub name: String,

    #[serde(default = "default_project")]
    pub project: String,

    /// Type-specific arguments, validated by the provider
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(kind: ResourceKind, name: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            kind,
            name: name.into(),
            project: default_project(),
            config,
        }
    }

    pub fn in_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn address(&self) -> String {
        address(self.kind, &self.name)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    resources: Vec<ResourceConfig>,
}

/// Desired resources indexed by address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML (or JSON) manifest with a top-level `resources` list
    pub fn from_manifest_str(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        let mut set = Self::new();
        for resource in manifest.resources {
            if resource.name.trim().is_empty() {
                return Err(CloudError::InvalidManifest(format!(
                    "{} resource without a name",
                    resource.kind
                )));
            }
            if !resource.config.is_object() {
                return Err(CloudError::InvalidManifest(format!(
                    "config of {} must be a mapping",
                    resource.address()
                )));
            }
            let key = resource.address();
            if set.resources.contains_key(&key) {
                return Err(CloudError::InvalidManifest(format!(
                    "duplicate resource {}",
                    key
                )));
            }
            set.resources.insert(key, resource);
        }
        Ok(set)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let set = Self::from_manifest_str(&content)?;
        tracing::debug!("Loaded {} resources from {}", set.len(), path.display());
        Ok(set)
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        self.resources.insert(resource.address(), resource);
    }

    pub fn get(&self, address: &str) -> Option<&ResourceConfig> {
        self.resources.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.resources.contains_key(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn by_kind(&self, kind: ResourceKind) -> Vec<&ResourceConfig> {
        self.resources.values().filter(|r| r.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
