//! Faxter API error types

use faxter_cloud::{CloudError, ReconcileError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Failed to {operation}: {status} - {detail}")]
    Status {
        operation: String,
        status: reqwest::StatusCode,
        detail: String,
    },

    #[error("Invalid configuration for {address}: {message}")]
    InvalidConfig { address: String, message: String },

    #[error("No {0} returned in create response")]
    EmptyResponse(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::NotFound(_) | ApiError::Reconcile(ReconcileError::NotFound { .. })
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Reconcile(ReconcileError::Cancelled))
    }
}

impl From<ApiError> for CloudError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(what) => CloudError::ResourceNotFound(what),
            ApiError::Unauthorized(msg) => CloudError::AuthenticationFailed(msg),
            ApiError::InvalidConfig { address, message } => {
                CloudError::InvalidConfig { address, message }
            }
            ApiError::Reconcile(e) => CloudError::Reconcile(e),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
