//! # Configuration Management
//!
//! Locates and loads the project's `envref.toml`. The file is found, in
//! priority order, from an explicit path (`--config`), the `ENVREF_CONFIG`
//! environment variable, or by walking up from the working directory.

pub mod settings;

pub use settings::{BackendDecl, ProfileConfig, ProjectConfig, DEFAULT_HISTORY_KEEP};

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{Error, Result};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "envref.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "ENVREF_CONFIG";

impl ProjectConfig {
    /// Parse and validate configuration text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ProjectConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::io(e, format!("Failed to read config file: {}", path.display()))
        })?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            Error::Config { message, source } => Error::Config {
                message: format!("{} ({})", message, path.display()),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), project = %config.project, "Loaded project configuration");
        Ok(config)
    }
}

/// Walk up from `start` looking for `envref.toml`.
pub fn discover(start: &Path) -> Option<PathBuf> {
    start.ancestors().map(|dir| dir.join(CONFIG_FILE_NAME)).find(|candidate| candidate.is_file())
}

/// Resolve the configuration file path from multiple sources
///
/// Checks sources in the following priority order:
/// 1. explicit path (`--config`)
/// 2. `ENVREF_CONFIG` environment variable
/// 3. `envref.toml` in `start` or any parent directory
pub fn locate(explicit: Option<PathBuf>, start: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        debug!(path = %path.display(), "Using configuration from --config flag");
        return Ok(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            debug!(path = %path, "Using configuration from {}", CONFIG_ENV_VAR);
            return Ok(PathBuf::from(path));
        }
    }

    discover(start).ok_or_else(|| {
        Error::config(format!(
            "No {} found in {} or any parent directory. Provide one via:\n\
             - --config flag\n\
             - {} environment variable",
            CONFIG_FILE_NAME,
            start.display(),
            CONFIG_ENV_VAR
        ))
    })
}

/// Directory that relative paths in the configuration are resolved against.
pub fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
