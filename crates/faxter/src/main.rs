mod commands;
mod utils;

use clap::{Parser, Subcommand};
use faxter_cloud::DEFAULT_PROJECT;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faxter")]
#[command(about = "Declarative provisioning for the Faxter cloud", long_about = None)]
struct Cli {
    /// Directory holding .faxter/state.json
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan {
        /// Resource manifest (YAML or JSON)
        #[arg(short = 'f', long = "file", default_value = "faxter.yaml")]
        file: PathBuf,
    },
    /// Create, update and delete resources to match the manifest
    Apply {
        /// Resource manifest (YAML or JSON)
        #[arg(short = 'f', long = "file", default_value = "faxter.yaml")]
        file: PathBuf,
    },
    /// Re-read every resource in state from the API
    Refresh,
    /// Destroy one resource, or everything in state
    Destroy {
        /// Resource address (e.g. server.web); omit to destroy everything
        address: Option<String>,
        /// Required to destroy everything
        #[arg(short, long)]
        yes: bool,
    },
    /// Inspect the local state file
    #[command(subcommand)]
    State(StateCommands),
    /// Wait for an existing server to come online
    Wait {
        /// Server name
        server: String,
        /// Project the server belongs to
        #[arg(short, long, default_value = DEFAULT_PROJECT)]
        project: String,
        /// Give up after this many seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
        /// Seconds between status checks (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List resources recorded in state
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    utils::init_tracing(cli.verbose);

    // Commands that never talk to the API
    match &cli.command {
        Commands::Version => {
            println!("faxter {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::State(StateCommands::List) => {
            return commands::state::list(&cli.dir).await;
        }
        Commands::Plan { file } => {
            return commands::plan::handle(&cli.dir, file).await;
        }
        _ => {}
    }

    let config = faxter_config::load()?;
    tracing::debug!("Using API at {}", config.base_url);
    let cancel = utils::cancel_on_ctrl_c();

    match cli.command {
        Commands::Apply { file } => {
            commands::apply::handle(&config, &cli.dir, &file, &cancel).await?;
        }
        Commands::Refresh => {
            commands::refresh::handle(&config, &cli.dir).await?;
        }
        Commands::Destroy { address, yes } => {
            commands::destroy::handle(&config, &cli.dir, address.as_deref(), yes, &cancel).await?;
        }
        Commands::Wait {
            server,
            project,
            timeout,
            interval,
        } => {
            commands::wait::handle(&config, &server, &project, timeout, interval, &cancel).await?;
        }
        Commands::Version | Commands::State(_) | Commands::Plan { .. } => {}
    }

    Ok(())
}
