pub mod connect;
pub mod creds;

pub use connect::connect_command;
pub use creds::creds_command;

use anyhow::Result;
use is_terminal::IsTerminal;
use sharepoint_connect::auth::CredentialPair;

/// Use the given password, or ask for one on the terminal
pub(crate) fn password_or_prompt(username: &str, password: Option<String>) -> Result<CredentialPair> {
    if let Some(password) = password {
        return Ok(CredentialPair::new(username, password));
    }

    if !std::io::stdin().is_terminal() {
        anyhow::bail!("No password given for '{}' and no terminal to ask on", username);
    }

    let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
    Ok(CredentialPair::new(username, password))
}
