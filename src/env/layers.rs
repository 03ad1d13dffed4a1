//! Locating and loading the base, profile and local layers.

use std::path::{Path, PathBuf};

use super::{Env, Warning};
use crate::config::ProjectConfig;
use crate::errors::Result;

/// Files that make up one merged Env, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPaths {
    /// Required base file
    pub base: PathBuf,
    /// Optional profile file
    pub profile: Option<PathBuf>,
    /// Optional local override file
    pub local: Option<PathBuf>,
}

impl LayerPaths {
    /// Base file only.
    pub fn base(path: impl Into<PathBuf>) -> Self {
        Self { base: path.into(), profile: None, local: None }
    }

    /// Layer files for `config`, resolved against `root`, with `profile` active.
    pub fn for_project(config: &ProjectConfig, root: &Path, profile: Option<&str>) -> Self {
        Self {
            base: root.join(&config.env_file),
            profile: profile.map(|name| root.join(config.profile_env_file(name))),
            local: Some(root.join(&config.local_file)),
        }
    }
}

/// Load every layer and merge them: base, then profile, then local.
///
/// A missing base file is fatal. A missing profile file is reported as a
/// warning on the merged Env; a missing local file is silently empty.
pub fn load_layers(paths: &LayerPaths) -> Result<Env> {
    let base = Env::load(&paths.base)?;

    let profile = match &paths.profile {
        Some(path) if !path.exists() => {
            tracing::warn!(path = %path.display(), "Profile env file not found; continuing without it");
            let mut empty = Env::new();
            empty.push_warning(Warning {
                path: Some(path.clone()),
                line: 0,
                message: "profile env file not found".to_string(),
            });
            empty
        }
        Some(path) => Env::load(path)?,
        None => Env::new(),
    };

    let local = match &paths.local {
        Some(path) => Env::load_optional(path)?,
        None => Env::new(),
    };

    let merged = Env::merge(&[&base, &profile, &local]);
    tracing::debug!(
        base = %paths.base.display(),
        profile = ?paths.profile,
        entries = merged.len(),
        warnings = merged.warnings().len(),
        "Merged env layers"
    );
    Ok(merged)
}
