//! # Reference Resolution
//!
//! Replaces every `ref://backend/path` value in a merged [`Env`] with the
//! secret it names. Each failure is recorded against its key and the literal
//! reference is kept, so callers always get the full partial result and
//! decide for themselves whether to accept it ([`ResolveResult::into_strict`]).

use std::sync::Arc;

use tracing::{debug, info, warn, Instrument};

use crate::env::{Entry, Env};
use crate::errors::{Error, Result};
use crate::reference::{RefParseError, RefUri};
use crate::secrets::{NamespacedBackend, SecretBackend, SecretBackendRegistry, SecretsError};

/// Why one reference could not be resolved
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("malformed reference: {0}")]
    MalformedRef(#[from] RefParseError),

    #[error("backend '{backend}' is not configured")]
    UnknownBackend { backend: String },

    #[error("secret '{path}' not found in backend '{backend}'")]
    NotFound { backend: String, path: String },

    #[error("backend '{backend}' failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: SecretsError,
    },
}

/// A resolution failure attached to the key whose value could not be resolved
#[derive(Debug)]
pub struct KeyError {
    pub key: String,
    /// The reference text as it appeared in the Env
    pub reference: String,
    pub error: ResolveError,
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

/// Output of a resolution pass
#[derive(Debug, Default)]
pub struct ResolveResult {
    /// Every entry of the input Env, in Env order. Resolved entries carry the
    /// secret value with `secret = true`; failed ones keep their reference.
    pub entries: Vec<Entry>,
    /// Failures, in Env order
    pub errors: Vec<KeyError>,
}

impl ResolveResult {
    /// Whether every reference resolved.
    pub fn resolved(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|e| e.value.as_str())
    }

    /// Keys that failed to resolve
    pub fn failed_keys(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.key.as_str()).collect()
    }

    /// Accept the entries only if nothing failed. Any failure discards every
    /// entry and yields a single [`Error::Strict`] naming the failed keys.
    pub fn into_strict(self) -> Result<Vec<Entry>> {
        if self.errors.is_empty() {
            Ok(self.entries)
        } else {
            Err(Error::strict(self.errors.into_iter().map(|e| e.key).collect()))
        }
    }
}

/// Resolve references using project-scoped lookups only.
pub async fn resolve(env: &Env, registry: &SecretBackendRegistry, project: &str) -> ResolveResult {
    resolve_with_profile(env, registry, project, None).await
}

/// Resolve references, trying `<project>/<profile>/<path>` before
/// `<project>/<path>` when a profile is active.
///
/// Backend calls are issued one at a time in Env order.
pub async fn resolve_with_profile(
    env: &Env,
    registry: &SecretBackendRegistry,
    project: &str,
    profile: Option<&str>,
) -> ResolveResult {
    let profile = profile.filter(|p| !p.is_empty());
    let span = match profile {
        Some(profile) => crate::resolve_span!(project, profile = profile),
        None => crate::resolve_span!(project),
    };

    async move {
        let mut result = ResolveResult::default();

        for entry in env.all() {
            if !entry.is_ref {
                result.entries.push(entry.clone());
                continue;
            }

            match resolve_entry(entry, registry, project, profile).await {
                Ok(value) => {
                    debug!(key = %entry.key, "Resolved reference");
                    let mut resolved = entry.clone();
                    resolved.value = value;
                    resolved.is_ref = false;
                    resolved.secret = true;
                    result.entries.push(resolved);
                }
                Err(error) => {
                    warn!(key = %entry.key, error = %error, "Failed to resolve reference");
                    result.entries.push(entry.clone());
                    result.errors.push(KeyError {
                        key: entry.key.clone(),
                        reference: entry.value.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            entries = result.entries.len(),
            failed = result.errors.len(),
            "Resolution complete"
        );
        result
    }
    .instrument(span)
    .await
}

async fn resolve_entry(
    entry: &Entry,
    registry: &SecretBackendRegistry,
    project: &str,
    profile: Option<&str>,
) -> std::result::Result<String, ResolveError> {
    let uri = RefUri::parse(&entry.value)?;
    let backend = registry
        .backend(&uri.backend)
        .ok_or_else(|| ResolveError::UnknownBackend { backend: uri.backend.clone() })?;

    if let Some(profile) = profile {
        let scoped = NamespacedBackend::with_profile(backend.clone(), project, profile);
        match lookup(&scoped, &uri).await? {
            Some(value) => return Ok(value),
            None => debug!(key = %entry.key, profile, "Not in profile scope, trying project scope"),
        }
    }

    let scoped = NamespacedBackend::new(Arc::clone(&backend), project);
    lookup(&scoped, &uri)
        .await?
        .ok_or_else(|| ResolveError::NotFound { backend: uri.backend.clone(), path: uri.path.clone() })
}

async fn lookup(
    backend: &NamespacedBackend,
    uri: &RefUri,
) -> std::result::Result<Option<String>, ResolveError> {
    match backend.get(&uri.path).await {
        Ok(value) => Ok(Some(value)),
        Err(SecretsError::NotFound { .. }) => Ok(None),
        Err(source) => Err(ResolveError::Backend { backend: uri.backend.clone(), source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::error::Result as SecretsResult;
    use crate::secrets::{MemorySecretBackend, SecretBackendType};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct BrokenBackend;

    #[async_trait]
    impl SecretBackend for BrokenBackend {
        fn backend_type(&self) -> SecretBackendType {
            SecretBackendType::Memory
        }
        async fn get(&self, _key: &str) -> SecretsResult<String> {
            Err(SecretsError::connection_failed("connection refused"))
        }
        async fn set(&self, _key: &str, _value: &str) -> SecretsResult<()> {
            Err(SecretsError::connection_failed("connection refused"))
        }
        async fn delete(&self, _key: &str) -> SecretsResult<()> {
            Err(SecretsError::connection_failed("connection refused"))
        }
        async fn list(&self) -> SecretsResult<Vec<String>> {
            Err(SecretsError::connection_failed("connection refused"))
        }
    }

    fn registry(secrets: &[(&str, &str)]) -> SecretBackendRegistry {
        let mut registry = SecretBackendRegistry::new();
        let store = MemorySecretBackend::with_secrets(secrets.iter().copied());
        registry.register("store", Arc::new(store)).unwrap();
        registry.register("broken", Arc::new(BrokenBackend)).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_resolves_project_scoped_refs() {
        let env = Env::from_bytes(b"HOST=localhost\nDB_PASS=ref://store/db_pass\n").unwrap();
        let registry = registry(&[("myapp/db_pass", "hunter2")]);

        let result = resolve(&env, &registry, "myapp").await;
        assert!(result.resolved());
        assert_eq!(result.value("HOST"), Some("localhost"));

        let entry = result.get("DB_PASS").unwrap();
        assert_eq!(entry.value, "hunter2");
        assert!(entry.secret);
        assert!(!entry.is_ref);
        assert!(!result.get("HOST").unwrap().secret);
    }

    #[tokio::test]
    async fn test_profile_scope_wins_then_falls_back() {
        let env = Env::from_bytes(b"A=ref://store/a\nB=ref://store/b\n").unwrap();
        let registry = registry(&[
            ("myapp/staging/a", "staging-a"),
            ("myapp/a", "project-a"),
            ("myapp/b", "project-b"),
        ]);

        let result = resolve_with_profile(&env, &registry, "myapp", Some("staging")).await;
        assert_eq!(result.value("A"), Some("staging-a"));
        assert_eq!(result.value("B"), Some("project-b"));
    }

    #[tokio::test]
    async fn test_failures_are_per_key_and_ordered() {
        let env = Env::from_bytes(
            b"OK=ref://store/ok\nMISSING=ref://store/nope\nBAD=ref://store\nGONE=ref://keychain/x\nDOWN=ref://broken/x\n",
        )
        .unwrap();
        let registry = registry(&[("myapp/ok", "fine")]);

        let result = resolve(&env, &registry, "myapp").await;
        assert_eq!(result.value("OK"), Some("fine"));
        assert_eq!(result.failed_keys(), vec!["MISSING", "BAD", "GONE", "DOWN"]);
        assert!(matches!(result.errors[0].error, ResolveError::NotFound { .. }));
        assert!(matches!(result.errors[1].error, ResolveError::MalformedRef(_)));
        assert!(matches!(result.errors[2].error, ResolveError::UnknownBackend { .. }));
        assert!(matches!(result.errors[3].error, ResolveError::Backend { .. }));

        // Failed entries keep the literal reference
        assert_eq!(result.value("MISSING"), Some("ref://store/nope"));
        assert_eq!(result.entries.len(), 5);
    }

    #[tokio::test]
    async fn test_backend_fault_does_not_fall_back() {
        let env = Env::from_bytes(b"X=ref://broken/x\n").unwrap();
        let registry = registry(&[]);
        let result = resolve_with_profile(&env, &registry, "myapp", Some("dev")).await;
        assert!(matches!(result.errors[0].error, ResolveError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_into_strict() {
        let env = Env::from_bytes(b"A=1\nB=ref://store/missing\n").unwrap();
        let registry = registry(&[]);

        let err = resolve(&env, &registry, "myapp").await.into_strict().unwrap_err();
        assert!(err.is_strict());
        assert!(err.to_string().contains("B"));

        let env = Env::from_bytes(b"A=1\n").unwrap();
        let entries = resolve(&env, &registry, "myapp").await.into_strict().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_key_error_display() {
        let env = Env::from_bytes(b"K=ref://nowhere/x\n").unwrap();
        let result = resolve(&env, &registry(&[]), "myapp").await;
        assert_eq!(result.errors[0].to_string(), "K: backend 'nowhere' is not configured");
    }
}
