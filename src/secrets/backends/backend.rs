//! Secret backend trait and types
//!
//! Defines the capability every secret store provides to the resolver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::secrets::error::{Result, SecretsError};

/// Type of secret backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackendType {
    /// In-process map, discarded at exit
    Memory,
    /// Read-only process environment
    Env,
    /// Plaintext JSON document on disk
    File,
    /// HashiCorp Vault KV v2
    Vault,
}

impl SecretBackendType {
    /// Get the configuration representation of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Env => "env",
            Self::File => "file",
            Self::Vault => "vault",
        }
    }
}

impl FromStr for SecretBackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "env" => Ok(Self::Env),
            "file" => Ok(Self::File),
            "vault" => Ok(Self::Vault),
            _ => Err(format!("Unknown secret backend type: {}", s)),
        }
    }
}

impl fmt::Display for SecretBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for secret backends
///
/// `get` and `delete` must fail with [`SecretsError::NotFound`] when the key is
/// absent; any other error is treated as a backend fault. Implementations must
/// never log secret values.
#[async_trait]
pub trait SecretBackend: Send + Sync + fmt::Debug {
    /// Get the backend type identifier
    fn backend_type(&self) -> SecretBackendType;

    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<String>;

    /// Create or overwrite `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys currently stored
    async fn list(&self) -> Result<Vec<String>>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(SecretsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release any held resources. Called once by the registry.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Reject keys no backend can store.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SecretsError::invalid_key(key, "key cannot be empty"));
    }
    if key.chars().any(char::is_control) {
        return Err(SecretsError::invalid_key(key, "key cannot contain control characters"));
    }
    Ok(())
}
