use crate::utils;
use colored::Colorize;
use faxter_api::FaxterProvider;
use faxter_cloud::{CloudProvider, StateManager};
use faxter_config::ProviderConfig;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    dir: &Path,
    address: Option<&str>,
    yes: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if address.is_none() && !yes {
        anyhow::bail!("refusing to destroy every resource without --yes");
    }

    let provider = FaxterProvider::from_config(config)?;
    let manager = StateManager::new(dir);
    let lock = manager.acquire_lock("destroy").await?;
    let mut state = manager.load().await?;

    match address {
        Some(address) => {
            let outcome = provider.destroy(address, &mut state).await;
            manager.save(&mut state).await?;
            lock.release().await?;
            outcome?;
            println!("{} {}", "✓ Destroyed".green(), address);
            Ok(())
        }
        None => {
            println!("{} {} resources", "Destroying".red(), state.resources.len());
            let result = provider.destroy_all(&mut state, cancel).await?;
            manager.save(&mut state).await?;
            lock.release().await?;

            utils::print_apply_result(&result);
            utils::ensure_success(&result)
        }
    }
}
