//! Provider error types

use crate::reconcile::ReconcileError;
use thiserror::Error;

/// Errors surfaced by providers, planning and state handling
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration for {address}: {message}")]
    InvalidConfig { address: String, message: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CloudError {
    /// Whether this error represents cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloudError::Reconcile(ReconcileError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
