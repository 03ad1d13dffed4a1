//! # Configuration Settings
//!
//! Shape of `envref.toml`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;
use validator::Validate;

use crate::errors::{Error, Result};
use crate::secrets::{SecretBackendType, MAX_HISTORY_KEEP};

/// Default number of superseded values kept by `secret rotate`.
pub const DEFAULT_HISTORY_KEEP: usize = 5;

/// Project configuration loaded from `envref.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProjectConfig {
    /// Project name, used as the namespace prefix in every backend
    #[validate(length(min = 1, message = "project name cannot be empty"))]
    pub project: String,

    /// Base env file, relative to the project root
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    /// Local override file, relative to the project root
    #[serde(default = "default_local_file")]
    pub local_file: PathBuf,

    /// Profile applied when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_profile: Option<String>,

    /// Suppress all output when any reference fails to resolve
    #[serde(default)]
    pub strict: bool,

    /// History slots retained per secret on rotation
    #[serde(default = "default_history_keep")]
    pub history_keep: usize,

    /// Backend declarations; the first one is the default backend
    #[serde(default)]
    #[validate(nested)]
    pub backends: Vec<BackendDecl>,

    /// Named profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// One `[[backends]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendDecl {
    /// Name used in `ref://<name>/...`
    #[validate(length(min = 1, message = "backend name cannot be empty"))]
    pub name: String,

    /// Backend type (`memory`, `env`, `file`, `vault`)
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific options
    #[serde(default)]
    pub config: toml::Table,
}

impl BackendDecl {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { name: name.into(), kind: kind.into(), config: toml::Table::new() }
    }

    /// Add a string option (builder style, mostly for tests).
    pub fn with_option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.config.insert(key.to_string(), toml::Value::String(value.into()));
        self
    }
}

/// One `[profiles.<name>]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Env file for this profile; defaults to `.env.<profile>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

fn default_local_file() -> PathBuf {
    PathBuf::from(".env.local")
}

fn default_history_keep() -> usize {
    DEFAULT_HISTORY_KEEP
}

impl ProjectConfig {
    /// Minimal configuration with default file names and no backends.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            env_file: default_env_file(),
            local_file: default_local_file(),
            active_profile: None,
            strict: false,
            history_keep: DEFAULT_HISTORY_KEEP,
            backends: Vec::new(),
            profiles: BTreeMap::new(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if self.project.contains('/') {
            return Err(Error::validation_field("project name cannot contain '/'", "project"));
        }
        if self.history_keep > MAX_HISTORY_KEEP {
            return Err(Error::validation_field(
                format!("history_keep cannot exceed {}", MAX_HISTORY_KEEP),
                "history_keep",
            ));
        }

        let mut names = HashSet::new();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                return Err(Error::validation_field(
                    format!("duplicate backend name '{}'", backend.name),
                    "backends",
                ));
            }
            if backend.name.contains('/') {
                return Err(Error::validation_field(
                    format!("backend name '{}' cannot contain '/'", backend.name),
                    "backends",
                ));
            }
            SecretBackendType::from_str(&backend.kind)
                .map_err(|e| Error::validation_field(e, "backends"))?;
        }

        for name in self.profiles.keys() {
            if name.is_empty() || name.contains('/') {
                return Err(Error::validation_field(
                    format!("invalid profile name '{}'", name),
                    "profiles",
                ));
            }
        }

        Ok(())
    }

    /// Pick the active profile: an explicit override wins over the file.
    /// An empty override disables profiles.
    pub fn active_profile(&self, override_profile: Option<&str>) -> Option<String> {
        match override_profile {
            Some("") => None,
            Some(name) => Some(name.to_string()),
            None => self.active_profile.clone(),
        }
    }

    /// Env file for `profile`, relative to the project root.
    pub fn profile_env_file(&self, profile: &str) -> PathBuf {
        self.profiles
            .get(profile)
            .and_then(|p| p.env_file.clone())
            .unwrap_or_else(|| PathBuf::from(format!(".env.{}", profile)))
    }

    /// Whether the profile is declared in `[profiles]`.
    pub fn has_profile(&self, profile: &str) -> bool {
        self.profiles.contains_key(profile)
    }
}
