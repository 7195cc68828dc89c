//! `spconnect creds`: stored credential management

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::*;
use sharepoint_connect::auth::{ConnectionRequest, CredentialResolver, KeyringStore, lookup_keys};
use sharepoint_connect::config::Config;

use super::password_or_prompt;

#[derive(Args, Debug)]
pub struct CredsCommands {
    #[command(subcommand)]
    pub command: CredsSubcommands,
}

#[derive(Subcommand, Debug)]
pub enum CredsSubcommands {
    /// Store credentials under a url, site prefix or host name
    Add {
        /// Lookup key, e.g. https://contoso.sharepoint.com/sites or contoso.sharepoint.com
        #[arg(long)]
        key: String,
        /// Username
        #[arg(long)]
        username: String,
        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Remove stored credentials
    Remove {
        /// Lookup key the credentials were stored under
        #[arg(long)]
        key: String,
    },
    /// Show which stored credentials a connect to this url would use
    Lookup {
        /// Site url
        #[arg(long)]
        url: String,
    },
}

pub async fn creds_command(args: CredsCommands, config: &Config) -> Result<()> {
    let store = KeyringStore::new(config.keyring_service());

    match args.command {
        CredsSubcommands::Add {
            key,
            username,
            password,
        } => {
            let credentials = password_or_prompt(&username, password)?;
            store.store(&key, &credentials)?;
            println!("  {} {}", "✓ Stored credentials for".bright_green(), key.cyan());
        }
        CredsSubcommands::Remove { key } => {
            if store.remove(&key)? {
                println!("  {} {}", "✓ Removed credentials for".bright_green(), key.cyan());
            } else {
                println!("  {} {}", "No stored credentials for".bright_yellow(), key.cyan());
            }
        }
        CredsSubcommands::Lookup { url } => {
            let request = ConnectionRequest::new(&url)?;

            println!("  {}", "Keys checked, most specific first:".bright_white().bold());
            for key in lookup_keys(&request.url) {
                println!("    {}", key.dimmed());
            }

            match CredentialResolver::new(&store).resolve_with_key(&request.url)? {
                Some((key, credentials)) => {
                    println!();
                    println!("  {}: {}", "Matched".dimmed(), key.cyan());
                    println!("  {}: {}", "Username".dimmed(), credentials.username().white());
                }
                None => {
                    println!();
                    println!("  {}", "No stored credentials match this url".bright_yellow());
                }
            }
        }
    }

    Ok(())
}
