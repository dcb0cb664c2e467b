//! Planned actions and apply results

use crate::resource::{ResourceConfig, ResourceKind, ResourceSet};
use crate::state::GlobalState;
use serde::{Deserialize, Serialize};

/// A planned change to one resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// `<type>-<address>`, unique within a plan
    pub id: String,

    pub action_type: ActionType,

    pub kind: ResourceKind,

    pub address: String,

    /// Human readable summary
    pub description: String,

    /// Desired configuration; absent for deletions
    pub desired: Option<ResourceConfig>,
}

impl Action {
    fn new(action_type: ActionType, kind: ResourceKind, address: &str) -> Self {
        Self {
            id: format!("{}-{}", action_type, address),
            action_type,
            kind,
            address: address.to_string(),
            description: String::new(),
            desired: None,
        }
    }

    fn with_desired(mut self, desired: &ResourceConfig) -> Self {
        self.desired = Some(desired.clone());
        self
    }

    fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    pub succeeded: Vec<ActionResult>,

    pub failed: Vec<ActionResult>,

    /// Set when the run stopped early because of cancellation
    pub cancelled: bool,

    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, action_id: String, error: String) {
        self.failed.push(ActionResult {
            action_id,
            message: String::new(),
            error: Some(error),
        });
    }
}

/// Outcome of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,

    pub message: String,

    pub error: Option<String>,
}

/// Ordered list of actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,

    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Compare desired resources against applied state.
    ///
    /// Deletions come first, dependents before their dependencies. Creations
    /// and updates follow in dependency order.
    pub fn diff(desired: &ResourceSet, state: &GlobalState) -> Self {
        let mut deletes: Vec<Action> = state
            .resources
            .iter()
            .filter(|(address, _)| !desired.contains(address))
            .map(|(address, current)| {
                Action::new(ActionType::Delete, current.kind, address)
                    .describe(format!("{} will be destroyed", address))
            })
            .collect();
        deletes.sort_by(|a, b| b.kind.cmp(&a.kind).then_with(|| a.address.cmp(&b.address)));

        let mut changes: Vec<Action> = desired
            .iter()
            .map(|resource| {
                let address = resource.address();
                match state.get_resource(&address) {
                    None => Action::new(ActionType::Create, resource.kind, &address)
                        .with_desired(resource)
                        .describe(format!("{} will be created", address)),
                    Some(current)
                        if current.config != resource.config
                            || current.project != resource.project =>
                    {
                        Action::new(ActionType::Update, resource.kind, &address)
                            .with_desired(resource)
                            .describe(format!("{} will be updated in-place", address))
                    }
                    Some(_) => Action::new(ActionType::NoOp, resource.kind, &address)
                        .with_desired(resource)
                        .describe(format!("{} is up to date", address)),
                }
            })
            .collect();
        changes.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.address.cmp(&b.address)));

        deletes.extend(changes);
        Self::new(deletes)
    }

    /// Plan the removal of everything in state
    pub fn destroy_all(state: &GlobalState) -> Self {
        Self::diff(&ResourceSet::new(), state)
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Counts of planned actions per type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to destroy, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}
