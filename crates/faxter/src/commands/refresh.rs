use colored::Colorize;
use faxter_api::FaxterProvider;
use faxter_cloud::{CloudProvider, StateManager};
use faxter_config::ProviderConfig;
use std::path::Path;

pub async fn handle(config: &ProviderConfig, dir: &Path) -> anyhow::Result<()> {
    let provider = FaxterProvider::from_config(config)?;

    let manager = StateManager::new(dir);
    let lock = manager.acquire_lock("refresh").await?;
    let mut state = manager.load().await?;

    println!("{} {} resources", "Refreshing".blue(), state.resources.len());
    let removed = provider.refresh(&mut state).await?;

    manager.save(&mut state).await?;
    lock.release().await?;

    for address in &removed {
        println!("  {} {} (gone, removed from state)", "-".red(), address);
    }
    println!("{}", "✓ State refreshed".green());
    Ok(())
}
