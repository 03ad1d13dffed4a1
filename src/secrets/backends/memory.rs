//! In-memory secret backend.
//!
//! Values live only for the lifetime of the process. Used for tests and for
//! throwaway sessions where nothing should touch disk.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::backend::{validate_key, SecretBackend, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};

#[derive(Debug, Default)]
pub struct MemorySecretBackend {
    secrets: RwLock<BTreeMap<String, String>>,
}

impl MemorySecretBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated backend.
    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let secrets = secrets.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { secrets: RwLock::new(secrets) }
    }
}

#[async_trait]
impl SecretBackend for MemorySecretBackend {
    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Memory
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        self.secrets.read().await.get(key).cloned().ok_or_else(|| SecretsError::not_found(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.secrets.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.secrets
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SecretsError::not_found(key))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.secrets.read().await.keys().cloned().collect())
    }
}
