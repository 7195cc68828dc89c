use anyhow::Result;
use clap::Parser;
use log::info;

mod cli;

use cli::{Cli, Commands};
use sharepoint_connect::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("spconnect.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting spconnect");

    let config = Config::load()?;

    match cli.command {
        Commands::Connect(args) => cli::commands::connect_command(args, &config).await?,
        Commands::Creds(args) => cli::commands::creds_command(args, &config).await?,
    }

    Ok(())
}
