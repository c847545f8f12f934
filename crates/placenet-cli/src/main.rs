//! # placenet - command-line driver for the place-cell replay network
//!
//! Feeds a scripted trajectory and reward schedule into the network, either
//! as fast as possible or paced in real time, and writes the results as JSON.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use placenet_cli::{error::CliResult, PlacenetCli};

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = PlacenetCli::parse();

    // Initialize logging with environment variable support
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = cli.execute().await {
        error!("Command failed: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
