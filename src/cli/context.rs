//! Per-invocation project state shared by the command handlers.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::output::{report_error, report_warning};
use super::prompt::StdinPrompt;
use crate::config::{self, ProjectConfig};
use crate::env::{interpolate, load_layers, Env, LayerPaths};
use crate::resolve::{resolve_with_profile, ResolveResult};
use crate::secrets::{NamespacedBackend, SecretBackendRegistry};

/// Environment variable selecting the active profile
pub const PROFILE_ENV_VAR: &str = "ENVREF_PROFILE";

/// Loaded configuration plus everything derived from it
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub config_path: PathBuf,
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub profile: Option<String>,
}

impl ProjectContext {
    /// Locate and load `envref.toml`. `profile` (from `--profile` or
    /// `ENVREF_PROFILE`) overrides the configured active profile.
    pub fn load(config_path: Option<PathBuf>, profile: Option<&str>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Self::load_from(config_path, profile, &cwd)
    }

    pub fn load_from(config_path: Option<PathBuf>, profile: Option<&str>, cwd: &Path) -> Result<Self> {
        let config_path = config::locate(config_path, cwd)?;
        let config = ProjectConfig::load(&config_path)?;
        let root = config::project_root(&config_path);
        let profile = config.active_profile(profile);

        if let Some(name) = &profile {
            if !config.has_profile(name) {
                debug!(profile = %name, "Profile not declared; using default env file name");
            }
        }

        Ok(Self { config_path, root, config, profile })
    }

    pub fn project(&self) -> &str {
        &self.config.project
    }

    pub fn layer_paths(&self) -> LayerPaths {
        LayerPaths::for_project(&self.config, &self.root, self.profile.as_deref())
    }

    /// Same project with a different profile.
    pub fn with_profile(&self, profile: Option<&str>) -> Self {
        let mut other = self.clone();
        other.profile = profile.filter(|p| !p.is_empty()).map(str::to_string);
        other
    }

    /// Load, merge and interpolate the layers, reporting diagnostics on stderr.
    pub fn load_env(&self) -> Result<Env> {
        let mut env = load_layers(&self.layer_paths())?;
        for warning in env.warnings() {
            report_warning(warning);
        }
        for cycle in interpolate(&mut env) {
            report_warning(format!("interpolation cycle: {}", cycle));
        }
        Ok(env)
    }

    /// Build the backend registry, prompting on a terminal when a backend
    /// needs a credential.
    pub async fn registry(&self) -> Result<SecretBackendRegistry> {
        SecretBackendRegistry::from_config(
            &self.config.backends,
            &self.root,
            StdinPrompt::if_interactive(),
        )
        .await
        .context("Failed to initialize secret backends")
    }

    /// Resolve `env` and report every per-key error on stderr.
    pub async fn resolve(&self, env: &Env, registry: &SecretBackendRegistry) -> ResolveResult {
        let result =
            resolve_with_profile(env, registry, self.project(), self.profile.as_deref()).await;
        for error in &result.errors {
            report_error(error);
        }
        result
    }

    /// Backend `name` (or the default one) scoped to this project, and to
    /// the active profile when `profile_scope` is set.
    pub fn scoped_backend(
        &self,
        registry: &SecretBackendRegistry,
        name: Option<&str>,
        profile_scope: bool,
    ) -> Result<(String, NamespacedBackend)> {
        let (name, backend) = match name {
            Some(name) => {
                let backend = registry.backend(name).with_context(|| {
                    format!(
                        "Unknown backend '{}'. Configured backends: {}",
                        name,
                        registry.names().join(", ")
                    )
                })?;
                (name.to_string(), backend)
            }
            None => {
                let (name, backend) = registry
                    .default_backend()
                    .context("No secret backends configured in envref.toml")?;
                (name.to_string(), backend)
            }
        };

        let scoped = match (&self.profile, profile_scope) {
            (Some(profile), true) => NamespacedBackend::with_profile(backend, self.project(), profile),
            (None, true) => anyhow::bail!("--profile-scope requires an active profile"),
            (_, false) => NamespacedBackend::new(backend, self.project()),
        };
        Ok((name, scoped))
    }
}
