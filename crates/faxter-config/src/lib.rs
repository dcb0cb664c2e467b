pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.faxter.com";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

pub const ENV_TOKEN: &str = "FAXTER_TOKEN";
pub const ENV_API_URL: &str = "FAXTER_API_URL";
pub const ENV_POLL_TIMEOUT: &str = "FAXTER_POLL_TIMEOUT";
pub const ENV_POLL_INTERVAL: &str = "FAXTER_POLL_INTERVAL";
pub const ENV_CONFIG_PATH: &str = "FAXTER_CONFIG_PATH";

/// Resolved provider configuration
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
    pub token: String,
    pub base_url: String,
    pub poll: PollSettings,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("poll", &self.poll)
            .finish()
    }
}

/// How long to wait for asynchronously provisioned resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl PollSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// On-disk shape; every field is optional so the environment can fill gaps
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    token: Option<String>,
    base_url: Option<String>,
    #[serde(default)]
    poll: FilePoll,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilePoll {
    timeout_secs: Option<u64>,
    interval_secs: Option<u64>,
}

/// Location of the config file
///
/// 1. FAXTER_CONFIG_PATH
/// 2. ~/.config/faxter/config.yaml
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("faxter").join("config.yaml"))
}

/// Load configuration from the default file location and the environment
pub fn load() -> Result<ProviderConfig> {
    load_from(config_file_path().as_deref())
}

/// Load configuration: defaults, then `path` if it exists, then environment
pub fn load_from(path: Option<&Path>) -> Result<ProviderConfig> {
    let file = match path {
        Some(p) if p.exists() => read_file(p)?,
        Some(p) => {
            tracing::debug!("No config file at {}", p.display());
            FileConfig::default()
        }
        None => FileConfig::default(),
    };

    let token = env_string(ENV_TOKEN)
        .or(file.token)
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingToken)?;

    let base_url = env_string(ENV_API_URL)
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = base_url.trim_end_matches('/').to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: "base_url".to_string(),
            value: base_url,
        });
    }

    let timeout_secs = match env_u64(ENV_POLL_TIMEOUT)? {
        Some(v) => v,
        None => file.poll.timeout_secs.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
    };
    let interval_secs = match env_u64(ENV_POLL_INTERVAL)? {
        Some(v) => v,
        None => file.poll.interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
    };
    if interval_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "poll.interval_secs".to_string(),
            value: "0".to_string(),
        });
    }

    Ok(ProviderConfig {
        token,
        base_url,
        poll: PollSettings {
            timeout_secs,
            interval_secs,
        },
    })
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!("Loaded config file {}", path.display());
    Ok(config)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}
