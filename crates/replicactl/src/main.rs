use clap::Parser;
use eyre::Result as EyreResult;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, EnvFilter};

mod cli;

use cli::RootCommand;

#[tokio::main]
async fn main() -> EyreResult<()> {
    let command = RootCommand::parse();

    setup(command.args.verbose)?;

    command.run().await
}

fn setup(verbose: u8) -> EyreResult<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::builder().parse("replicactl=info,replica_=info"))?,
        1 => EnvFilter::new("replicactl=debug,replica_=debug"),
        _ => EnvFilter::new("trace"),
    };

    registry().with(filter).with(layer()).init();

    Ok(())
}
