//! Project and profile scoping for a shared backend.
//!
//! Several projects can share one store. Wrapping a backend in a
//! [`NamespacedBackend`] makes every operation act on
//! `<project>/<key>` (or `<project>/<profile>/<key>`) and hides everything
//! outside that prefix from `list`.

use async_trait::async_trait;
use std::sync::Arc;

use super::backend::{validate_key, SecretBackend, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};

#[derive(Debug, Clone)]
pub struct NamespacedBackend {
    inner: Arc<dyn SecretBackend>,
    prefix: String,
}

impl NamespacedBackend {
    /// Scope `inner` to `project`. An empty project leaves keys unprefixed.
    pub fn new(inner: Arc<dyn SecretBackend>, project: &str) -> Self {
        let prefix = if project.is_empty() { String::new() } else { format!("{}/", project) };
        Self { inner, prefix }
    }

    /// Scope `inner` to one profile of `project`.
    pub fn with_profile(inner: Arc<dyn SecretBackend>, project: &str, profile: &str) -> Self {
        let prefix = match (project.is_empty(), profile.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!("{}/", project),
            (true, false) => format!("{}/", profile),
            (false, false) => format!("{}/{}/", project, profile),
        };
        Self { inner, prefix }
    }

    /// Namespace prefix including the trailing `/`, or empty.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fully qualified key in the wrapped backend.
    pub fn qualify(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    // Report the caller's key, not the qualified one.
    fn unqualify_error(&self, key: &str, err: SecretsError) -> SecretsError {
        match err {
            SecretsError::NotFound { .. } => SecretsError::not_found(key),
            other => other,
        }
    }
}

#[async_trait]
impl SecretBackend for NamespacedBackend {
    fn backend_type(&self) -> SecretBackendType {
        self.inner.backend_type()
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        self.inner.get(&self.qualify(key)).await.map_err(|e| self.unqualify_error(key, e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.inner.set(&self.qualify(key), value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.inner.delete(&self.qualify(key)).await.map_err(|e| self.unqualify_error(key, e))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let keys = self.inner.list().await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(self.prefix.as_str()).map(str::to_string))
            .filter(|k| !k.is_empty())
            .collect())
    }
}
