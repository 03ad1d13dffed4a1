//! Pluggable secret backend architecture
//!
//! Every store the resolver can read from implements [`SecretBackend`]. The
//! registry builds them from `[[backends]]` declarations in `envref.toml`.
//!
//! ## Supported Backends
//!
//! - **memory**: in-process map, nothing persisted
//! - **env**: read-only process environment
//! - **file**: plaintext JSON on disk, for development
//! - **vault**: HashiCorp Vault KV v2 engine (`vault` feature)

pub mod backend;
pub mod env;
pub mod file;
pub mod memory;
pub mod namespaced;
pub mod registry;
#[cfg(feature = "vault")]
pub mod vault;

pub use backend::{SecretBackend, SecretBackendType};
pub use env::{EnvBackendConfig, EnvSecretBackend};
pub use file::{FileBackendConfig, FileSecretBackend};
pub use memory::MemorySecretBackend;
pub use namespaced::NamespacedBackend;
pub use registry::SecretBackendRegistry;
#[cfg(feature = "vault")]
pub use vault::{VaultBackendConfig, VaultSecretBackend};
