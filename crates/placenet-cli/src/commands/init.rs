//! Configuration initialization command

use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::config::PlacenetConfig;
use crate::error::{CliError, CliResult};

/// Write the default configuration
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(self, workspace: PathBuf, config: Option<PathBuf>) -> CliResult<()> {
        let path = PlacenetConfig::resolve_path(&workspace, config.as_deref());
        if path.exists() && !self.force {
            return Err(CliError::invalid_args(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }

        PlacenetConfig::default().save_to_file(&path)?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }
}
