//! Interactive host capabilities
//!
//! The connect flow never talks to the terminal directly. Credential
//! prompts and browser logins go through an [`InteractiveHost`], so
//! automation can run without a TTY and tests can script the answers.

use colored::*;
use dialoguer::{Input, Password};
use is_terminal::IsTerminal;

use super::request::CredentialPair;
use crate::error::{ConnectError, Result};

pub trait InteractiveHost: Send + Sync {
    /// Ask the user for a username and password
    fn prompt_for_credential(&self, title: &str, prompt: &str) -> Result<CredentialPair>;

    /// Send the user to `url` and block until they hand back the resulting
    /// token (session cookie, authorization code or redirect URL)
    fn open_browser_login(&self, url: &str) -> Result<String>;
}

/// Host used when nobody is at the keyboard
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractiveHost;

impl InteractiveHost for NonInteractiveHost {
    fn prompt_for_credential(&self, title: &str, _prompt: &str) -> Result<CredentialPair> {
        Err(ConnectError::no_credentials(title))
    }

    fn open_browser_login(&self, url: &str) -> Result<String> {
        Err(ConnectError::configuration(format!(
            "interactive login to {} requires a terminal",
            url
        )))
    }
}

/// Prompts on stdin/stdout with dialoguer
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalHost;

impl TerminalHost {
    fn is_interactive() -> bool {
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
    }
}

/// Ctrl-C and closed input both surface as io errors from dialoguer
fn prompt_error(error: dialoguer::Error) -> ConnectError {
    ConnectError::cancelled(format!("prompt aborted: {}", error))
}

impl InteractiveHost for TerminalHost {
    fn prompt_for_credential(&self, title: &str, prompt: &str) -> Result<CredentialPair> {
        if !Self::is_interactive() {
            return Err(ConnectError::no_credentials(title));
        }

        println!();
        println!("  {}", prompt.bright_white().bold());

        let username: String = Input::new()
            .with_prompt("Username")
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)?;

        if username.trim().is_empty() {
            return Err(ConnectError::cancelled("no username entered"));
        }

        let password = Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)?;

        Ok(CredentialPair::new(username.trim(), password))
    }

    fn open_browser_login(&self, url: &str) -> Result<String> {
        if !Self::is_interactive() {
            return Err(ConnectError::configuration(format!(
                "interactive login to {} requires a terminal",
                url
            )));
        }

        println!();
        println!("  {}", "Open the following address in your browser and sign in:".bright_white().bold());
        println!("    {}", url.cyan());
        println!("  {}", "Paste the value you were given below. Leave it empty to cancel.".dimmed());

        let token = Password::new()
            .with_prompt("Token")
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)?;

        if token.trim().is_empty() {
            return Err(ConnectError::cancelled("browser login was cancelled"));
        }

        Ok(token.trim().to_string())
    }
}
