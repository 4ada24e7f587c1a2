//! oct - main entry point

use anyhow::Context;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use oct::cli::Cli;
use oct::configuration::Configuration;
use oct::{commands, process_guard};

/// Initialize logging; RUST_LOG overrides the default level
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    // Stop playbook process groups if we are interrupted
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    let mut config = Configuration::load().context("Failed to load configuration")?;

    // Save even when the command failed; the command's error wins.
    let result = commands::dispatch(&cli, &mut config);
    let saved = config.persist().context("Failed to save configuration");

    result?;
    saved
}
