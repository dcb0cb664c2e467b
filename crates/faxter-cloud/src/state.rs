//! Persisted resource state
//!
//! Manages `.faxter/state.json`, the record of what has been applied and the
//! attributes the backend reported for it.

use crate::error::{CloudError, Result};
use crate::reconcile::{ProvisioningResult, ProvisioningStatus};
use crate::resource::{ResourceConfig, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".faxter";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_HOURS: i64 = 1;

pub const ATTR_STATUS: &str = "status";
pub const ATTR_IP_ADDRESSES: &str = "ip_addresses";
pub const ATTR_REQUEST_FLOATING_IP: &str = "request_floating_ip";

/// All applied resources, keyed by address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,

    /// Incremented on every save
    #[serde(default)]
    pub serial: u64,

    pub updated_at: DateTime<Utc>,

    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resource(&mut self, address: String, state: ResourceState) {
        self.resources.insert(address, state);
        self.updated_at = Utc::now();
    }

    pub fn remove_resource(&mut self, address: &str) -> Option<ResourceState> {
        let removed = self.resources.remove(address);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn get_resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    pub fn get_resource_mut(&mut self, address: &str) -> Option<&mut ResourceState> {
        self.resources.get_mut(address)
    }
}

/// State of a single applied resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: ResourceKind,

    /// Backend identifier; for servers this is the provisioning handle
    pub id: String,

    pub project: String,

    pub status: ResourceStatus,

    /// Arguments as last applied
    pub config: serde_json::Value,

    /// Computed attributes reported by the backend
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource: &ResourceConfig) -> Self {
        let now = Utc::now();
        Self {
            kind: resource.kind,
            id: id.into(),
            project: resource.project.clone(),
            status: ResourceStatus::Active,
            config: resource.config.clone(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Record the raw backend status string and its classification
    pub fn record_status(&mut self, raw: &str) {
        self.status = ResourceStatus::from_backend(raw);
        self.set_attribute(ATTR_STATUS, serde_json::json!(raw));
    }

    /// Write a reconciliation result into the computed attributes
    pub fn apply_provisioning(&mut self, result: &ProvisioningResult) {
        self.record_status(&result.status);
        self.set_attribute(ATTR_IP_ADDRESSES, serde_json::json!(result.addresses));
        if let Some(requested) = result.floating_ip_requested {
            self.set_attribute(ATTR_REQUEST_FLOATING_IP, serde_json::json!(requested));
        }
    }

    /// Replace the last-applied arguments after an update
    pub fn set_config(&mut self, resource: &ResourceConfig) {
        self.project = resource.project.clone();
        self.config = resource.config.clone();
        self.updated_at = Utc::now();
    }
}

/// Coarse lifecycle status kept in state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Created and usable
    Active,
    /// Still being provisioned by the backend
    Provisioning,
    /// Backend reported a failure
    Error,
    Unknown,
}

impl ResourceStatus {
    pub fn from_backend(raw: &str) -> Self {
        match ProvisioningStatus::classify(raw) {
            ProvisioningStatus::Ready => ResourceStatus::Active,
            ProvisioningStatus::Failed => ResourceStatus::Error,
            ProvisioningStatus::Pending(s) if s.is_empty() => ResourceStatus::Unknown,
            ProvisioningStatus::Pending(_) => ResourceStatus::Provisioning,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Active => write!(f, "active"),
            ResourceStatus::Provisioning => write!(f, "provisioning"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes the state directory
pub struct StateManager {
    root: PathBuf,
}

impl StateManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, starting from empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            serial = state.serial,
            "Loaded state with {} resources",
            state.resources.len()
        );
        Ok(state)
    }

    /// Persist `state`, bumping its serial and keeping the previous file as backup
    pub async fn save(&self, state: &mut GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        state.serial += 1;
        state.updated_at = Utc::now();
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(
            serial = state.serial,
            "Saved state with {} resources",
            state.resources.len()
        );
        Ok(())
    }

    /// Take the state lock for `operation`
    pub async fn acquire_lock(&self, operation: &str) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let held: LockInfo = serde_json::from_str(&content)?;

            let age = Utc::now().signed_duration_since(held.acquired_at);
            if age.num_hours() < STALE_LOCK_HOURS {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} ({}, pid {}) since {}",
                    held.holder, held.operation, held.pid, held.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock held by {}", held.holder);
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            operation: operation.to_string(),
            acquired_at: Utc::now(),
        };

        fs::write(&lock_path, serde_json::to_string_pretty(&info)?).await?;

        tracing::debug!(operation, "Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    operation: String,
    acquired_at: DateTime<Utc>,
}

/// Guard for the state lock; removes the lock file on drop
#[derive(Debug)]
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn server() -> ResourceConfig {
        ResourceConfig::new(ResourceKind::Server, "web", json!({"key_name": "deploy"}))
    }

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        let mut resource = ResourceState::new("web", &server());
        resource.apply_provisioning(&ProvisioningResult {
            status: "online".to_string(),
            addresses: vec!["10.0.0.5".to_string()],
            floating_ip_requested: Some(false),
        });
        state.set_resource("server.web".to_string(), resource);

        manager.save(&mut state).await.unwrap();
        assert_eq!(state.serial, 1);

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.serial, 1);
        let web = loaded.get_resource("server.web").unwrap();
        assert_eq!(web.status, ResourceStatus::Active);
        assert_eq!(
            web.get_attribute::<Vec<String>>(ATTR_IP_ADDRESSES),
            Some(vec!["10.0.0.5".to_string()])
        );
        assert_eq!(web.get_attribute::<bool>(ATTR_REQUEST_FLOATING_IP), Some(false));
    }

    #[tokio::test]
    async fn test_save_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let mut state = GlobalState::new();

        manager.save(&mut state).await.unwrap();
        manager.save(&mut state).await.unwrap();

        assert_eq!(state.serial, 2);
        assert!(temp_dir.path().join(".faxter/state.json.backup").exists());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(state.serial, 0);
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join(".faxter")).unwrap();
        std::fs::write(
            manager.state_path(),
            r#"{"version": 99, "updated_at": "2026-01-01T00:00:00Z", "resources": {}}"#,
        )
        .unwrap();

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, CloudError::StateError(_)));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock("apply").await.unwrap();
        let err = manager.acquire_lock("destroy").await.unwrap_err();
        assert!(matches!(err, CloudError::LockError(m) if m.contains("apply")));

        lock.release().await.unwrap();
        tokio_test::assert_ok!(manager.acquire_lock("destroy").await);
    }

    #[tokio::test]
    async fn test_stale_lock_replaced() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        std::fs::create_dir_all(temp_dir.path().join(".faxter")).unwrap();
        std::fs::write(
            temp_dir.path().join(".faxter/lock.json"),
            r#"{"holder": "ci", "pid": 1, "operation": "apply", "acquired_at": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        tokio_test::assert_ok!(manager.acquire_lock("apply").await);
    }

    #[test]
    fn test_status_from_backend() {
        assert_eq!(ResourceStatus::from_backend("online"), ResourceStatus::Active);
        assert_eq!(ResourceStatus::from_backend("error"), ResourceStatus::Error);
        assert_eq!(ResourceStatus::from_backend("building"), ResourceStatus::Provisioning);
        assert_eq!(ResourceStatus::from_backend(""), ResourceStatus::Unknown);
    }
}
