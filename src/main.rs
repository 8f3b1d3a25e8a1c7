//! Stowaway - offline-first caching proxy
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use stowaway::cli::{Cli, Commands};
use stowaway::config::{Config, ConfigManager};
use stowaway::error::{StowawayError, StowawayResult};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StowawayResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        // `config` subcommands may target a file that does not exist yet
        if !path.exists() && !matches!(cli.command, Commands::Config(_)) {
            return Err(StowawayError::ConfigNotFound(path.clone()));
        }
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| StowawayError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    for warning in config.warnings() {
        warn!("{}", warning);
    }
    if let Some(ref path) = local_config_path {
        debug!("Merged local config: {}", path.display());
    }

    // Dispatch to command
    match cli.command {
        Commands::Serve(args) => stowaway::cli::commands::serve(args, &config).await,
        Commands::Install => stowaway::cli::commands::install(&config).await,
        Commands::Activate => stowaway::cli::commands::activate(&config).await,
        Commands::Fetch(args) => stowaway::cli::commands::fetch(args, &config).await,
        Commands::Cache(args) => stowaway::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            stowaway::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("stowaway=warn"),
        1 => EnvFilter::new("stowaway=info"),
        _ => EnvFilter::new("stowaway=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
