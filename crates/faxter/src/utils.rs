use colored::Colorize;
use faxter_cloud::{ActionType, ApplyResult, Plan, ResourceStatus};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Log to stderr; `RUST_LOG` wins over `-v`
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Token cancelled on the first Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, stopping after the current step...".yellow());
            trigger.cancel();
        }
    });
    cancel
}

pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        let line = match action.action_type {
            ActionType::Create => format!("  + {}", action.address).green(),
            ActionType::Update => format!("  ~ {}", action.address).yellow(),
            ActionType::Delete => format!("  - {}", action.address).red(),
            ActionType::NoOp => continue,
        };
        println!("{}", line);
    }
    println!();
    println!("Plan: {}", plan.summary().to_string().bold());
}

pub fn print_apply_result(result: &ApplyResult) {
    for ok in &result.succeeded {
        println!("  {} {}", "✓".green(), ok.message);
    }
    for failed in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failed.action_id,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!();
    println!(
        "{} succeeded, {} failed ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms
    );
}

pub fn colored_status(status: ResourceStatus) -> colored::ColoredString {
    match status {
        ResourceStatus::Active => status.to_string().green(),
        ResourceStatus::Provisioning => status.to_string().yellow(),
        ResourceStatus::Error => status.to_string().red(),
        ResourceStatus::Unknown => status.to_string().dimmed(),
    }
}

/// Turn an unsuccessful apply into an error after reporting it
pub fn ensure_success(result: &ApplyResult) -> anyhow::Result<()> {
    if result.cancelled {
        anyhow::bail!("cancelled; state reflects the steps that completed");
    }
    if !result.is_success() {
        anyhow::bail!("{} action(s) failed", result.failed.len());
    }
    Ok(())
}
