//! Terminal prompt for credentials requested by backends.

use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;

use crate::secrets::error::{Result, SecretsError};
use crate::secrets::{PromptProvider, SecretString, SharedPrompt};

/// Reads a line from stdin after printing the request to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl StdinPrompt {
    /// A shared prompt if stdin is interactive, otherwise `None`.
    pub fn if_interactive() -> Option<SharedPrompt> {
        if std::io::stdin().is_terminal() {
            Some(Arc::new(StdinPrompt))
        } else {
            None
        }
    }
}

impl PromptProvider for StdinPrompt {
    /// Typed input is echoed to the terminal; nothing disables echo.
    fn prompt_secret(&self, message: &str) -> Result<SecretString> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{}: ", message)?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        let value = line.trim_end_matches(['\r', '\n']).to_string();
        if value.is_empty() {
            return Err(SecretsError::config_error(format!("No value entered for '{}'", message)));
        }
        Ok(SecretString::new(value))
    }
}
