//! File secret backend.
//!
//! Stores secrets as plaintext JSON. Intended for local development only; the
//! file is created with owner-only permissions on Unix but is not encrypted.
//!
//! ```json
//! {
//!   "version": 1,
//!   "secrets": {
//!     "myapp/DB_PASSWORD": { "value": "...", "updated_at": "2026-01-01T00:00:00Z" }
//!   }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::backend::{validate_key, SecretBackend, SecretBackendType};
use crate::secrets::error::{Result, SecretsError};

const STORE_VERSION: u32 = 1;

/// Configuration for the file backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackendConfig {
    /// Location of the JSON store
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSecret {
    value: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Store {
    version: u32,
    #[serde(default)]
    secrets: BTreeMap<String, StoredSecret>,
}

impl Default for Store {
    fn default() -> Self {
        Self { version: STORE_VERSION, secrets: BTreeMap::new() }
    }
}

#[derive(Debug)]
pub struct FileSecretBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileSecretBackend {
    pub fn new(config: FileBackendConfig) -> Self {
        Self { path: config.path, lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Store> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Store::default()),
            Ok(bytes) => {
                let store: Store = serde_json::from_slice(&bytes)?;
                if store.version != STORE_VERSION {
                    return Err(SecretsError::backend_error(format!(
                        "Unsupported secret store version {} in {}",
                        store.version,
                        self.path.display()
                    )));
                }
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Store::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file and rename over the store.
    async fn save(&self, store: &Store) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(store)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretBackend for FileSecretBackend {
    fn backend_type(&self) -> SecretBackendType {
        SecretBackendType::File
    }

    async fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        let _guard = self.lock.lock().await;
        let mut store = self.load().await?;
        store.secrets.remove(key).map(|s| s.value).ok_or_else(|| SecretsError::not_found(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let _guard = self.lock.lock().await;
        let mut store = self.load().await?;
        store
            .secrets
            .insert(key.to_string(), StoredSecret { value: value.to_string(), updated_at: Utc::now() });
        self.save(&store).await?;
        tracing::debug!(key = %key, path = %self.path.display(), "Stored secret in file backend");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let _guard = self.lock.lock().await;
        let mut store = self.load().await?;
        if store.secrets.remove(key).is_none() {
            return Err(SecretsError::not_found(key));
        }
        self.save(&store).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.secrets.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(dir: &TempDir) -> FileSecretBackend {
        FileSecretBackend::new(FileBackendConfig { path: dir.path().join("secrets.json") })
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        assert!(backend.list().await.unwrap().is_empty());
        assert!(backend.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        backend(&dir).set("myapp/API_KEY", "sk-123").await.unwrap();

        let reopened = backend(&dir);
        assert_eq!(reopened.get("myapp/API_KEY").await.unwrap(), "sk-123");
        assert_eq!(reopened.list().await.unwrap(), vec!["myapp/API_KEY"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.set("a", "1").await.unwrap();
        backend.delete("a").await.unwrap();
        assert!(backend.delete("a").await.unwrap_err().is_not_found());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.set("a", "1").await.unwrap();
        let mode = std::fs::metadata(backend.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        std::fs::write(backend.path(), r#"{"version": 9, "secrets": {}}"#).unwrap();
        assert!(matches!(backend.list().await.unwrap_err(), SecretsError::BackendError { .. }));
    }
}
