//! Faxter cloud infrastructure core
//!
//! Provider abstraction, planning, persisted state and the reconciliation
//! loop that waits for asynchronously provisioned resources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   faxter CLI                     │
//! │            (plan / apply / destroy)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 faxter-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   trait CloudProvider { ... }             │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌───────────────┐   │
//! │  │ Manifest │ │  State   │ │  Reconciler   │   │
//! │  └──────────┘ └──────────┘ └───────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │  faxter-api   │
//!           │ (REST client) │
//!           └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod reconcile;
pub mod resource;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{AuthStatus, CloudProvider};
pub use reconcile::{
    Clock, FetchError, PollConfig, ProvisioningHandle, ProvisioningResult, ProvisioningStatus,
    ReconcileError, ReconcileState, Reconciler, StatusFetch, StatusReport, TokioClock, reconcile,
};
pub use resource::{DEFAULT_PROJECT, ResourceConfig, ResourceKind, ResourceSet, address};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
