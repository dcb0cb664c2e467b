//! Faxter provider implementation

use crate::client::FaxterClient;
use crate::error::{ApiError, Result};
use crate::resources::handler_for;
use async_trait::async_trait;
use faxter_cloud::{
    Action, ActionType, ApplyResult, AuthStatus, CloudError, CloudProvider, GlobalState, Plan,
    PollConfig,
};
use faxter_config::ProviderConfig;
use tokio_util::sync::CancellationToken;

/// Outcome of a single action, before it is folded into [`ApplyResult`]
enum Outcome {
    Done(String),
    Skipped,
}

/// Faxter cloud provider
pub struct FaxterProvider {
    client: FaxterClient,
    poll: PollConfig,
}

impl FaxterProvider {
    pub fn new(client: FaxterClient, poll: PollConfig) -> Self {
        Self { client, poll }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = FaxterClient::from_config(config)?;
        let poll = PollConfig {
            deadline: config.poll.timeout(),
            interval: config.poll.interval(),
        };
        Ok(Self::new(client, poll))
    }

    pub fn client(&self) -> &FaxterClient {
        &self.client
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    async fn apply_action(
        &self,
        action: &Action,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let handler = handler_for(action.kind, self.poll);

        match action.action_type {
            ActionType::Create => {
                let desired = desired_of(action)?;
                tracing::info!("Creating {}", action.address);
                let created = handler.create(&self.client, desired, cancel).await?;
                let message = format!("{} created (id: {})", action.address, created.id);
                state.set_resource(action.address.clone(), created);
                Ok(Outcome::Done(message))
            }
            ActionType::Update => {
                let desired = desired_of(action)?;
                let Some(current) = state.get_resource_mut(&action.address) else {
                    return Err(ApiError::NotFound(action.address.clone()));
                };
                tracing::info!("Updating {}", action.address);
                handler.update(&self.client, current, desired).await?;
                Ok(Outcome::Done(format!("{} updated", action.address)))
            }
            ActionType::Delete => {
                let Some(current) = state.get_resource(&action.address) else {
                    return Ok(Outcome::Skipped);
                };
                tracing::info!("Destroying {}", action.address);
                match handler.delete(&self.client, current).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        tracing::warn!("{} was already gone", action.address);
                    }
                    Err(e) => return Err(e),
                }
                state.remove_resource(&action.address);
                Ok(Outcome::Done(format!("{} destroyed", action.address)))
            }
            ActionType::NoOp => Ok(Outcome::Skipped),
        }
    }
}

fn desired_of(action: &Action) -> Result<&faxter_cloud::ResourceConfig> {
    action.desired.as_ref().ok_or_else(|| ApiError::InvalidConfig {
        address: action.address.clone(),
        message: "planned action carries no configuration".to_string(),
    })
}

#[async_trait]
impl CloudProvider for FaxterProvider {
    fn name(&self) -> &str {
        "faxter"
    }

    async fn check_auth(&self) -> faxter_cloud::Result<AuthStatus> {
        match self.client.whoami().await {
            Ok(()) => Ok(AuthStatus::ok(format!(
                "token accepted by {}",
                self.client.base_url()
            ))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn refresh(&self, state: &mut GlobalState) -> faxter_cloud::Result<Vec<String>> {
        let addresses: Vec<String> = state.resources.keys().cloned().collect();
        let mut removed = Vec::new();

        for address in addresses {
            let Some(current) = state.get_resource_mut(&address) else {
                continue;
            };
            let handler = handler_for(current.kind, self.poll);

            match handler.read(&self.client, current).await {
                Ok(()) => {
                    tracing::debug!("{} is {}", address, current.status);
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!("{} no longer exists, removing from state", address);
                    state.remove_resource(&address);
                    removed.push(address);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }

    async fn apply(
        &self,
        plan: &Plan,
        state: &mut GlobalState,
        cancel: &CancellationToken,
    ) -> faxter_cloud::Result<ApplyResult> {
        let mut result = ApplyResult::new();
        let start = std::time::Instant::now();

        for action in &plan.actions {
            if cancel.is_cancelled() {
                tracing::warn!("Apply cancelled before {}", action.address);
                result.cancelled = true;
                break;
            }

            match self.apply_action(action, state, cancel).await {
                Ok(Outcome::Done(message)) => result.add_success(action.id.clone(), message),
                Ok(Outcome::Skipped) => {}
                Err(e) if e.is_cancelled() => {
                    tracing::warn!("Apply cancelled while processing {}", action.address);
                    result.add_failure(action.id.clone(), e.to_string());
                    result.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::error!("{} failed: {}", action.address, e);
                    result.add_failure(action.id.clone(), e.to_string());
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn destroy(&self, address: &str, state: &mut GlobalState) -> faxter_cloud::Result<()> {
        let current = state
            .get_resource(address)
            .ok_or_else(|| CloudError::ResourceNotFound(address.to_string()))?;
        let handler = handler_for(current.kind, self.poll);

        match handler.delete(&self.client, current).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!("{} was already gone", address);
            }
            Err(e) => return Err(e.into()),
        }

        state.remove_resource(address);
        Ok(())
    }
}
