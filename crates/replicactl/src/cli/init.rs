use std::fs::create_dir_all;

use clap::Parser;
use eyre::{bail, Result as EyreResult, WrapErr};
use replica_config::{ConfigFile, CONFIG_FILE};
use tracing::info;

use crate::cli::RootArgs;

/// Write a default configuration file
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(long, short)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(self, args: &RootArgs) -> EyreResult<()> {
        if ConfigFile::exists(&args.home) && !self.force {
            bail!(
                "{} already exists in {:?}, pass --force to overwrite it",
                CONFIG_FILE,
                args.home
            );
        }

        create_dir_all(&args.home)
            .wrap_err_with(|| format!("failed to create directory {:?}", args.home))?;

        ConfigFile::default().save(&args.home)?;

        info!(home = %args.home, "Initialized replica configuration");

        Ok(())
    }
}
