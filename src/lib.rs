//! # envref
//!
//! Builds a process environment from layered `.env` files and resolves
//! `ref://backend/path` values from pluggable secret backends.
//!
//! ## Pipeline
//!
//! ```text
//! .env            ─┐
//! .env.<profile>  ─┼─> merge ─> interpolate ${KEY} ─> resolve ref:// ─> entries + errors
//! .env.local      ─┘                                        │
//!                                         registry ─> namespaced backend ─> secret store
//! ```
//!
//! ## Core Components
//!
//! - **env**: line parser, ordered [`Env`] with merge, `${KEY}` interpolation, layer loading
//! - **reference**: `ref://` URI parsing
//! - **secrets**: backend trait, concrete stores, per-project namespacing, rotation
//! - **resolve**: turns references into values with per-key error collection
//! - **config**: `envref.toml` project configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use envref::config::ProjectConfig;
//! use envref::env::{interpolate, load_layers, LayerPaths};
//! use envref::secrets::SecretBackendRegistry;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> envref::Result<()> {
//!     let config = ProjectConfig::load(Path::new("envref.toml"))?;
//!     let root = Path::new(".");
//!     let mut env = load_layers(&LayerPaths::for_project(&config, root, None))?;
//!     interpolate(&mut env);
//!
//!     let registry = SecretBackendRegistry::from_config(&config.backends, root, None).await?;
//!     let entries = envref::resolve(&env, &registry, &config.project).await.into_strict()?;
//!     for entry in entries {
//!         println!("{}={}", entry.key, entry.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod env;
pub mod errors;
pub mod observability;
pub mod reference;
pub mod resolve;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::ProjectConfig;
pub use env::{Entry, Env};
pub use errors::{Error, Result};
pub use reference::RefUri;
pub use resolve::{resolve, resolve_with_profile, KeyError, ResolveError, ResolveResult};
pub use secrets::{SecretBackend, SecretBackendRegistry};
