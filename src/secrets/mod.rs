//! Secret storage for `ref://` resolution.
//!
//! The [`backends`] module defines the [`SecretBackend`] trait, the concrete
//! stores, the per-project [`NamespacedBackend`] wrapper and the
//! [`SecretBackendRegistry`] that owns them. [`rotation`] builds secret
//! lifecycle operations on top of any backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use envref::secrets::{MemorySecretBackend, NamespacedBackend, SecretBackend};
//!
//! let store: Arc<dyn SecretBackend> = Arc::new(MemorySecretBackend::new());
//! let scoped = NamespacedBackend::new(store, "myapp");
//! scoped.set("DB_PASSWORD", "hunter2").await?;
//! ```

pub mod backends;
pub mod error;
pub mod prompt;
pub mod rotation;
pub mod types;

pub use backends::{
    EnvSecretBackend, FileSecretBackend, MemorySecretBackend, NamespacedBackend, SecretBackend,
    SecretBackendRegistry, SecretBackendType,
};
pub use error::SecretsError;
pub use prompt::{PromptProvider, SharedPrompt, StaticPrompt};
pub use rotation::{
    generate_secret, history, history_key, rotate, HistoryEntry, RotationOutcome, MAX_HISTORY_KEEP,
};
pub use types::SecretString;
