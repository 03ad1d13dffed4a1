//! Secret backend registry
//!
//! Holds the configured backends by name, in declaration order. The first
//! declared backend is the default for commands that write secrets.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::{SecretBackend, SecretBackendType};
use super::env::{EnvBackendConfig, EnvSecretBackend};
use super::file::{FileBackendConfig, FileSecretBackend};
use super::memory::MemorySecretBackend;
use crate::config::BackendDecl;
use crate::errors::{Error, Result};
use crate::secrets::prompt::SharedPrompt;

/// Named collection of secret backends
///
/// Backends are closed exactly once, either by [`close`](Self::close) or when
/// the registry is dropped.
#[derive(Default)]
pub struct SecretBackendRegistry {
    backends: Vec<(String, Arc<dyn SecretBackend>)>,
    closed: bool,
}

impl std::fmt::Debug for SecretBackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBackendRegistry")
            .field(
                "backends",
                &self.backends.iter().map(|(n, b)| (n.as_str(), b.backend_type())).collect::<Vec<_>>(),
            )
            .field("closed", &self.closed)
            .finish()
    }
}

impl SecretBackendRegistry {
    /// Create a new registry with no backends
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under `name`. Names must be unique.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn SecretBackend>) -> Result<()> {
        let name = name.into();
        if self.backend(&name).is_some() {
            return Err(Error::config(format!("Secret backend '{}' is already registered", name)));
        }
        info!(backend = %name, backend_type = %backend.backend_type(), "Registering secret backend");
        self.backends.push((name, backend));
        Ok(())
    }

    /// Look up a backend by name
    pub fn backend(&self, name: &str) -> Option<Arc<dyn SecretBackend>> {
        self.backends.iter().find(|(n, _)| n == name).map(|(_, b)| b.clone())
    }

    /// First registered backend
    pub fn default_backend(&self) -> Option<(&str, Arc<dyn SecretBackend>)> {
        self.backends.first().map(|(n, b)| (n.as_str(), b.clone()))
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Build every declared backend.
    ///
    /// Relative file paths in backend options are taken relative to `root`.
    /// `prompt` is offered to backends that need an interactive credential.
    pub async fn from_config(
        decls: &[BackendDecl],
        root: &Path,
        prompt: Option<SharedPrompt>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for decl in decls {
            let backend = build_backend(decl, root, prompt.as_ref()).await?;
            registry.register(decl.name.clone(), backend)?;
        }
        debug!(backends = ?registry.names(), "Secret backend registry initialized");
        Ok(registry)
    }

    /// Close every backend. The first failure is returned after all backends
    /// have been given the chance to close.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        for (name, backend) in &self.backends {
            if let Err(e) = backend.close() {
                warn!(backend = %name, error = %e, "Failed to close secret backend");
                if first_error.is_none() {
                    first_error = Some(Error::secrets(e, format!("closing backend '{}'", name)));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for SecretBackendRegistry {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn typed_config<T: serde::de::DeserializeOwned>(decl: &BackendDecl) -> Result<T> {
    toml::Value::Table(decl.config.clone()).try_into().map_err(|e| {
        Error::config_with_source(
            format!("Invalid configuration for backend '{}'", decl.name),
            Box::new(e),
        )
    })
}

async fn build_backend(
    decl: &BackendDecl,
    root: &Path,
    prompt: Option<&SharedPrompt>,
) -> Result<Arc<dyn SecretBackend>> {
    let kind: SecretBackendType = decl.kind.parse().map_err(Error::config)?;

    let backend: Arc<dyn SecretBackend> = match kind {
        SecretBackendType::Memory => Arc::new(MemorySecretBackend::new()),
        SecretBackendType::Env => {
            let config: EnvBackendConfig =
                if decl.config.is_empty() { EnvBackendConfig::default() } else { typed_config(decl)? };
            Arc::new(EnvSecretBackend::new(decl.name.clone(), config))
        }
        SecretBackendType::File => {
            let mut config: FileBackendConfig = typed_config(decl)?;
            if config.path.is_relative() {
                config.path = root.join(&config.path);
            }
            Arc::new(FileSecretBackend::new(config))
        }
        #[cfg(feature = "vault")]
        SecretBackendType::Vault => {
            let config: super::vault::VaultBackendConfig = typed_config(decl)?;
            let backend = super::vault::VaultSecretBackend::new(config, prompt)
                .await
                .map_err(|e| Error::secrets(e, format!("initializing backend '{}'", decl.name)))?;
            Arc::new(backend)
        }
        #[cfg(not(feature = "vault"))]
        SecretBackendType::Vault => {
            let _ = prompt;
            return Err(Error::config(format!(
                "Backend '{}' requires the 'vault' feature, which this build does not include",
                decl.name
            )));
        }
    };
    Ok(backend)
}
