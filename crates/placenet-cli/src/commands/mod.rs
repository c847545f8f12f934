//! CLI command implementations for placenet

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::CliResult;

pub mod init;
pub mod run;
pub mod topology;

/// placenet - place-cell attractor network with reward-triggered replay
#[derive(Parser, Debug)]
#[command(
    name = "placenet",
    version,
    about = "Place-cell attractor network with reward-triggered replay",
    long_about = "placenet simulates a rate-based place-cell lattice with short-term \
                  plasticity and intrinsic excitability. It drives the network from a \
                  scripted trajectory, runs reverse replay when reward arrives, and \
                  writes traces, snapshots and weight tables as JSON."
)]
pub struct PlacenetCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Workspace directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Configuration file path (defaults to <workspace>/placenet.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    #[command(alias = "new")]
    Init(init::InitCommand),

    /// Run the network against the configured scenario
    Run(run::RunCommand),

    /// Export the lattice topology and weights
    Topology(topology::TopologyCommand),
}

impl PlacenetCli {
    /// Execute the CLI command
    pub async fn execute(self) -> CliResult<()> {
        let workspace = match self.workspace {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let config = self.config;

        match self.command {
            Commands::Init(cmd) => cmd.execute(workspace, config).await,
            Commands::Run(cmd) => cmd.execute(workspace, config).await,
            Commands::Topology(cmd) => cmd.execute(workspace, config).await,
        }
    }
}
