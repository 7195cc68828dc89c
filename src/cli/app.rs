use super::commands::connect::ConnectCommands;
use super::commands::creds::CredsCommands;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "spconnect")]
#[command(about = "Connect to SharePoint sites with the authentication method of your choice")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate against a site and show the resulting connection
    Connect(ConnectCommands),
    /// Manage credentials stored in the OS keychain
    Creds(CredsCommands),
}
