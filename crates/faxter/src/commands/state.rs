use crate::utils;
use colored::Colorize;
use faxter_cloud::StateManager;
use faxter_cloud::state::ATTR_IP_ADDRESSES;
use std::path::Path;

pub async fn list(dir: &Path) -> anyhow::Result<()> {
    let state = StateManager::new(dir).load().await?;

    if state.resources.is_empty() {
        println!("{}", "No resources in state".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<32} {:<14} {:<16} {:<20}", "ADDRESS", "STATUS", "PROJECT", "ADDRESSES").bold()
    );
    println!("{}", "─".repeat(84).dimmed());

    for (address, resource) in &state.resources {
        let addresses = resource
            .get_attribute::<Vec<String>>(ATTR_IP_ADDRESSES)
            .map(|ips| ips.join(", "))
            .unwrap_or_default();
        println!(
            "{:<32} {:<14} {:<16} {}",
            address,
            utils::colored_status(resource.status),
            resource.project,
            addresses
        );
    }

    println!();
    println!("serial {} updated {}", state.serial, state.updated_at);
    Ok(())
}
