//! Cloud provider trait definition

use crate::action::{ApplyResult, Plan};
use crate::error::Result;
use crate::resource::ResourceSet;
use crate::state::GlobalState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Lifecycle of declared resources against one backend
///
/// Providers never persist state themselves; they mutate the [`GlobalState`]
/// handed to them and the caller saves it.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Provider name (e.g. "faxter")
    fn name(&self) -> &str;

    /// Check that the configured credentials are accepted
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Re-read every resource in `state`, dropping the ones the backend no
    /// longer knows. Returns the removed addresses.
    async fn refresh(&self, state: &mut GlobalState) -> Result<Vec<String>>;

    /// Calculate the diff between desired resources and applied state
    fn plan(&self, desired: &ResourceSet, state: &GlobalState) -> Plan {
        Plan::diff(desired, state)
    }

    /// Apply the planned actions, recording each outcome in `state`
    async fn apply(
        &self,
        plan: &Plan,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult>;

    /// Destroy a single resource by address
    async fn destroy(&self, address: &str, state: &mut GlobalState) -> Result<()>;

    /// Destroy everything recorded in `state`
    async fn destroy_all(
        &self,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult> {
        let plan = Plan::destroy_all(state);
        self.apply(&plan, state, cancel).await
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,

    pub account_info: Option<String>,

    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
