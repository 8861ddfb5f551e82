//! Shared helpers for command handlers.

use std::io::IsTerminal;

use secrecy::SecretString;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Use the password given on the command line, or prompt for one.
pub fn password_or_prompt(given: Option<String>, prompt: &str) -> Result<SecretString, CliError> {
    let password = match given {
        Some(password) => password,
        None if std::io::stdin().is_terminal() => rpassword::prompt_password(prompt)?,
        None => {
            return Err(CliError::Validation {
                field: "password".into(),
                reason: "no terminal to prompt on; pass --password".into(),
            });
        }
    };
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}
