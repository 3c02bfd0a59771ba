//! blestream CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use blestream_cli::{
    cli::Cli,
    commands::CommandDispatcher,
    config::{CliConfig, CliOverrides},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli).context("failed to load configuration")?;

    if let Err(e) = CommandDispatcher::execute(cli.command, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Layer defaults, config file, environment and flags
fn load_configuration(cli: &Cli) -> blestream_cli::Result<CliConfig> {
    let overrides = CliOverrides {
        write_window: cli.write_window,
    };

    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            CliConfig::load_with_overrides(Some(path), &overrides)
        }
        None => CliConfig::load_with_overrides(None::<&str>, &overrides),
    }
}
