//! Vault secret backend implementation
//!
//! Stores each secret in the HashiCorp Vault KV v2 engine as a document with
//! a single `value` field, at the key's path within the mount.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use super::backend::{validate_key, SecretBackend, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::prompt::SharedPrompt;
use crate::secrets::types::SecretString;

const VALUE_FIELD: &str = "value";

/// Configuration for Vault backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultBackendConfig {
    /// Vault server address
    pub address: String,
    /// Vault authentication token. Falls back to `VAULT_TOKEN`, then to an
    /// interactive prompt.
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Vault namespace (for Enterprise)
    #[serde(default)]
    pub namespace: Option<String>,
    /// KV v2 mount path (default: "secret")
    #[serde(default = "default_kv_mount")]
    pub mount_path: String,
}

fn default_kv_mount() -> String {
    "secret".to_string()
}

impl VaultBackendConfig {
    /// Pick the token from config, the environment, or the prompt, in that order.
    fn resolve_token(&self, prompt: Option<&SharedPrompt>) -> Result<SecretString> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        if let Ok(token) = std::env::var("VAULT_TOKEN") {
            if !token.is_empty() {
                return Ok(SecretString::new(token));
            }
        }
        match prompt {
            Some(prompt) => prompt.prompt_secret(&format!("Vault token for {}", self.address)),
            None => Err(SecretsError::config_error(
                "Vault token not configured: set 'token', VAULT_TOKEN, or run interactively",
            )),
        }
    }
}

/// HashiCorp Vault secret backend
pub struct VaultSecretBackend {
    client: VaultClient,
    mount_path: String,
}

impl std::fmt::Debug for VaultSecretBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretBackend")
            .field("mount_path", &self.mount_path)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultSecretBackend {
    /// Create a new Vault backend with the given configuration
    pub async fn new(config: VaultBackendConfig, prompt: Option<&SharedPrompt>) -> Result<Self> {
        let token = config.resolve_token(prompt)?;

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address).token(token.expose_secret());

        if let Some(ref namespace) = config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        let settings = settings_builder.build().map_err(|e| {
            SecretsError::config_error(format!("Invalid Vault backend configuration: {}", e))
        })?;

        let client = VaultClient::new(settings).map_err(|e| {
            SecretsError::connection_failed(format!("Failed to create Vault client: {}", e))
        })?;

        info!(address = %config.address, mount_path = %config.mount_path, "Initialized Vault secret backend");

        Ok(Self { client, mount_path: config.mount_path })
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
        match kv2::list(&self.client, &self.mount_path, dir).await {
            Ok(keys) => Ok(keys),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(map_error(e, dir)),
        }
    }
}

fn is_not_found(e: &ClientError) -> bool {
    matches!(e, ClientError::APIError { code: 404, .. })
}

fn map_error(e: ClientError, key: &str) -> SecretsError {
    match e {
        ClientError::APIError { code: 404, .. } => SecretsError::not_found(key),
        ClientError::APIError { code: 401 | 403, .. } => {
            SecretsError::authentication_failed(format!("Vault denied access to '{}': {}", key, e))
        }
        other => {
            error!(key = %key, error = %other, "Vault request failed");
            SecretsError::backend_error(format!("Vault request for '{}' failed: {}", key, other))
        }
    }
}

#[async_trait]
impl SecretBackend for VaultSecretBackend {
    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::Vault
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        debug!(key = %key, mount_path = %self.mount_path, "Reading secret from Vault");

        let data: HashMap<String, String> =
            kv2::read(&self.client, &self.mount_path, key).await.map_err(|e| map_error(e, key))?;

        data.get(VALUE_FIELD).cloned().ok_or_else(|| {
            SecretsError::backend_error(format!("Secret '{}' has no '{}' field", key, VALUE_FIELD))
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let mut data = HashMap::new();
        data.insert(VALUE_FIELD.to_string(), value.to_string());

        kv2::set(&self.client, &self.mount_path, key, &data).await.map_err(|e| map_error(e, key))?;

        debug!(key = %key, mount_path = %self.mount_path, "Stored secret in Vault");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        // Metadata delete succeeds for absent paths, so check first.
        kv2::read_metadata(&self.client, &self.mount_path, key)
            .await
            .map_err(|e| map_error(e, key))?;
        kv2::delete_metadata(&self.client, &self.mount_path, key)
            .await
            .map_err(|e| map_error(e, key))?;

        debug!(key = %key, mount_path = %self.mount_path, "Deleted secret from Vault");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(dir) = pending.pop() {
            for entry in self.list_dir(&dir).await? {
                let full = format!("{}{}", dir, entry);
                if full.ends_with('/') {
                    pending.push(full);
                } else {
                    keys.push(full);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::prompt::StaticPrompt;
    use std::sync::Arc;

    fn config(token: Option<&str>) -> VaultBackendConfig {
        VaultBackendConfig {
            address: "http://127.0.0.1:8200".to_string(),
            token: token.map(SecretString::new),
            namespace: None,
            mount_path: default_kv_mount(),
        }
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: VaultBackendConfig =
            toml::from_str(r#"address = "http://vault:8200""#).unwrap();
        assert_eq!(config.mount_path, "secret");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_configured_token_wins() {
        let token = config(Some("s.configured")).resolve_token(None).unwrap();
        assert_eq!(token.expose_secret(), "s.configured");
    }

    #[test]
    fn test_prompt_supplies_missing_token() {
        if std::env::var("VAULT_TOKEN").is_ok() {
            return;
        }
        let prompt: SharedPrompt = Arc::new(StaticPrompt::new("s.prompted"));
        let token = config(None).resolve_token(Some(&prompt)).unwrap();
        assert_eq!(token.expose_secret(), "s.prompted");
    }

    #[test]
    fn test_not_found_mapping() {
        let err = map_error(ClientError::APIError { code: 404, errors: vec![] }, "a/b");
        assert!(err.is_not_found());

        let err = map_error(ClientError::APIError { code: 403, errors: vec![] }, "a/b");
        assert!(matches!(err, SecretsError::AuthenticationFailed { .. }));
    }
}
