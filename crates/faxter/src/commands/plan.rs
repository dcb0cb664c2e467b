use colored::Colorize;
use faxter_cloud::{Plan, ResourceSet, StateManager};
use std::path::Path;

pub async fn handle(dir: &Path, manifest: &Path) -> anyhow::Result<()> {
    let desired = ResourceSet::load(dir.join(manifest)).await?;
    let state = StateManager::new(dir).load().await?;

    println!(
        "{} {} ({} resources)",
        "Planning".blue(),
        manifest.display().to_string().cyan(),
        desired.len()
    );

    let plan = Plan::diff(&desired, &state);
    if !plan.has_changes {
        println!("{}", "No changes. Infrastructure matches the manifest.".green());
        return Ok(());
    }

    println!();
    crate::utils::print_plan(&plan);
    Ok(())
}
