//! Environment-variable secret backend (read-only).
//!
//! Maps a key such as `myapp/db_password` to `ENVREF_SECRET_MYAPP_DB_PASSWORD`.
//! Useful in CI where secrets are injected as variables by the runner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::{validate_key, SecretBackend, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};

/// Default variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "ENVREF_SECRET_";

/// Configuration for the env backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvBackendConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    DEFAULT_ENV_PREFIX.to_string()
}

impl Default for EnvBackendConfig {
    fn default() -> Self {
        Self { prefix: default_prefix() }
    }
}

#[derive(Debug, Clone)]
pub struct EnvSecretBackend {
    name: String,
    prefix: String,
}

impl EnvSecretBackend {
    pub fn new(name: impl Into<String>, config: EnvBackendConfig) -> Self {
        Self { name: name.into(), prefix: config.prefix }
    }

    /// Variable name a key maps to. ASCII alphanumerics are upper-cased and
    /// every other character becomes `_`.
    pub fn var_name(&self, key: &str) -> String {
        let suffix: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }

    fn read_only(&self, operation: &str) -> SecretsError {
        SecretsError::read_only(&self.name, operation)
    }
}

#[async_trait]
impl SecretBackend for EnvSecretBackend {
    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Env
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        std::env::var(self.var_name(key)).map_err(|_| SecretsError::not_found(key))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(self.read_only("set"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(self.read_only("delete"))
    }

    /// Variable-name suffixes after the prefix. The key mapping is lossy, so
    /// these are not guaranteed to round-trip through `get`.
    async fn list(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = std::env::vars()
            .filter_map(|(name, _)| name.strip_prefix(&self.prefix).map(str::to_string))
            .filter(|suffix| !suffix.is_empty())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn backend(prefix: &str) -> EnvSecretBackend {
        EnvSecretBackend::new("ci", EnvBackendConfig { prefix: prefix.to_string() })
    }

    #[test]
    fn test_var_name_mapping() {
        let backend = EnvSecretBackend::new("ci", EnvBackendConfig::default());
        assert_eq!(backend.var_name("myapp/db-password"), "ENVREF_SECRET_MYAPP_DB_PASSWORD");
    }

    #[tokio::test]
    async fn test_get_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("ENVREF_TEST_GET_MYAPP_TOKEN", "t0k3n");

        let backend = backend("ENVREF_TEST_GET_");
        assert_eq!(backend.get("myapp/token").await.unwrap(), "t0k3n");
        assert!(backend.get("myapp/other").await.unwrap_err().is_not_found());

        std::env::remove_var("ENVREF_TEST_GET_MYAPP_TOKEN");
    }

    #[tokio::test]
    async fn test_list_strips_prefix() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var("ENVREF_TEST_LIST_A", "1");
        std::env::set_var("ENVREF_TEST_LIST_B", "2");

        let keys = backend("ENVREF_TEST_LIST_").list().await.unwrap();
        assert_eq!(keys, vec!["A", "B"]);

        std::env::remove_var("ENVREF_TEST_LIST_A");
        std::env::remove_var("ENVREF_TEST_LIST_B");
    }

    #[tokio::test]
    async fn test_writes_are_read_only() {
        let backend = backend("ENVREF_TEST_RO_");
        let err = backend.set("k", "v").await.unwrap_err();
        assert!(matches!(err, SecretsError::ReadOnly { .. }));
        assert!(err.to_string().contains("cannot set"));
        assert!(matches!(backend.delete("k").await.unwrap_err(), SecretsError::ReadOnly { .. }));
    }
}
