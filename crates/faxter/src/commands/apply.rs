use crate::utils;
use colored::Colorize;
use faxter_api::FaxterProvider;
use faxter_cloud::{CloudProvider, ResourceSet, StateManager};
use faxter_config::ProviderConfig;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    dir: &Path,
    manifest: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let desired = ResourceSet::load(dir.join(manifest)).await?;
    let provider = FaxterProvider::from_config(config)?;

    let manager = StateManager::new(dir);
    let lock = manager.acquire_lock("apply").await?;
    let mut state = manager.load().await?;

    let plan = provider.plan(&desired, &state);
    if !plan.has_changes {
        println!("{}", "No changes. Infrastructure matches the manifest.".green());
        lock.release().await?;
        return Ok(());
    }

    utils::print_plan(&plan);
    println!();
    println!("{}", "Applying...".blue());

    let result = provider.apply(&plan, &mut state, cancel).await?;

    // Persist whatever completed, even on failure
    manager.save(&mut state).await?;
    lock.release().await?;

    utils::print_apply_result(&result);
    utils::ensure_success(&result)
}
