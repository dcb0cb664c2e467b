use colored::Colorize;
use faxter_api::{FaxterClient, ServerStatusFetch};
use faxter_cloud::{PollConfig, ProvisioningHandle, Reconciler};
use faxter_config::ProviderConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub async fn handle(
    config: &ProviderConfig,
    server: &str,
    project: &str,
    timeout: Option<u64>,
    interval: Option<u64>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let poll = PollConfig {
        deadline: timeout.map_or(config.poll.timeout(), Duration::from_secs),
        interval: interval.map_or(config.poll.interval(), Duration::from_secs),
    };
    if poll.interval.is_zero() {
        anyhow::bail!("--interval must be at least 1 second");
    }

    let client = FaxterClient::from_config(config)?;
    let handle = ProvisioningHandle::new(server)?;
    let fetch = ServerStatusFetch::new(&client, project);

    println!(
        "{} {} (timeout {:?}, every {:?})",
        "Waiting for".blue(),
        server.cyan(),
        poll.deadline,
        poll.interval
    );

    let result = Reconciler::new(poll).reconcile(&handle, &fetch, cancel).await?;

    println!("{} {} is {}", "✓".green(), server, result.status.green());
    if !result.addresses.is_empty() {
        println!("  addresses: {}", result.addresses.join(", "));
    }
    Ok(())
}
