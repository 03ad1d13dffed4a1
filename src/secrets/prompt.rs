//! Interactive credential prompts.
//!
//! Backends that may need a credential at construction time (a Vault token,
//! for example) receive an optional [`PromptProvider`] from whoever builds the
//! registry. Non-interactive callers pass `None` and the backend fails with a
//! configuration error instead of blocking.

use std::sync::Arc;

use super::error::Result;
use super::types::SecretString;

/// Supplies credentials on demand.
pub trait PromptProvider: Send + Sync {
    /// Ask for a secret value, described by `message`.
    fn prompt_secret(&self, message: &str) -> Result<SecretString>;
}

/// Shared handle passed into backend construction.
pub type SharedPrompt = Arc<dyn PromptProvider>;

/// Prompt provider that answers from a fixed value.
#[derive(Clone)]
pub struct StaticPrompt {
    value: SecretString,
}

impl StaticPrompt {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: SecretString::new(value) }
    }
}

impl PromptProvider for StaticPrompt {
    fn prompt_secret(&self, _message: &str) -> Result<SecretString> {
        Ok(self.value.clone())
    }
}
