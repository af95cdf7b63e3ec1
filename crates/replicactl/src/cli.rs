use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, Subcommand};
use eyre::Result as EyreResult;
use replica_config::ConfigFile;
use tracing::info;

mod init;
mod simulate;

use init::InitCommand;
use simulate::SimulateCommand;

pub const EXAMPLES: &str = r"
  # Write a default configuration
  $ replicactl --home data/ init

  # Sync an empty replica from a simulated peer of height 64
  $ replicactl --home data/ simulate --height 64

  # Same, with debug logging and a committed batch on top
  $ replicactl --home data/ -v simulate --height 64 --commit 3
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = format!(
    "Environment variables:\n  REPLICA_HOME    Directory holding config.toml\n\nExamples:{EXAMPLES}"
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    #[command(alias = "sim")]
    Simulate(SimulateCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory holding the configuration file
    #[arg(long, value_name = "PATH", default_value = ".")]
    #[arg(env = "REPLICA_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,

    /// Enable verbose logging (can be specified multiple times)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl RootArgs {
    /// Configuration under `home`, or the defaults when none was written.
    pub fn config(&self) -> EyreResult<ConfigFile> {
        if ConfigFile::exists(&self.home) {
            return ConfigFile::load(&self.home);
        }

        info!(home = %self.home, "No configuration found, using defaults");

        Ok(ConfigFile::default())
    }
}

impl RootCommand {
    pub async fn run(self) -> EyreResult<()> {
        match self.action {
            SubCommands::Init(init) => init.run(&self.args),
            SubCommands::Simulate(simulate) => simulate.run(&self.args).await,
        }
    }
}
