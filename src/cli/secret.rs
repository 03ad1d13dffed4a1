//! Secret CLI commands
//!
//! Reads and writes secrets in a configured backend, scoped to the project
//! (and optionally the active profile) exactly as `ref://` resolution sees them.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::Instrument;

use super::context::ProjectContext;
use super::output::{print_json, report_success, MASK};
use super::prompt::StdinPrompt;
use crate::secrets::{
    generate_secret, history, rotate, PromptProvider, SecretBackend, MAX_HISTORY_KEEP,
};

/// Length of generated values when `rotate` gets no explicit value
const DEFAULT_GENERATED_LENGTH: usize = 32;

fn parse_keep(raw: &str) -> std::result::Result<usize, String> {
    let keep: usize = raw.parse().map_err(|e| format!("{}", e))?;
    if keep > MAX_HISTORY_KEEP {
        return Err(format!("at most {} previous values can be kept", MAX_HISTORY_KEEP));
    }
    Ok(keep)
}

#[derive(Subcommand, Debug)]
pub enum SecretCommands {
    /// Store a secret
    #[command(
        after_help = "EXAMPLES:\n    # Prompt for the value\n    envref secret set DB_PASSWORD\n\n    # Store in a specific backend, scoped to the active profile\n    envref secret set API_KEY sk-123 --backend vault --profile-scope"
    )]
    Set {
        /// Secret key (the path part of ref://<backend>/<path>)
        key: String,
        /// Value; prompted for when omitted
        value: Option<String>,
        #[command(flatten)]
        target: Target,
    },

    /// Print a secret value
    Get {
        key: String,
        #[command(flatten)]
        target: Target,
    },

    /// Delete a secret
    Delete {
        key: String,
        #[command(flatten)]
        target: Target,
    },

    /// List secret keys in the project namespace
    List {
        #[command(flatten)]
        target: Target,
        /// Output format (table or json)
        #[arg(short, long, default_value = "table", value_parser = ["table", "json"])]
        output: String,
    },

    /// Replace a secret, keeping previous values as history
    #[command(
        long_about = "Replace a secret and archive the previous value.\n\nThe previous value moves to history slot 1 and older slots shift up; slots beyond the retention count are deleted. Rotation is not atomic: a backend failure part way through can leave history partially shifted.",
        after_help = "EXAMPLES:\n    # Generate a new random value\n    envref secret rotate API_KEY\n\n    # Rotate to a given value and keep two previous values\n    envref secret rotate API_KEY --value sk-456 --keep 2"
    )]
    Rotate {
        key: String,
        /// New value; a random one is generated when omitted
        #[arg(long)]
        value: Option<String>,
        /// Length of a generated value
        #[arg(long, default_value_t = DEFAULT_GENERATED_LENGTH)]
        length: usize,
        /// Previous values to keep (defaults to history_keep in envref.toml)
        #[arg(long, value_parser = parse_keep)]
        keep: Option<usize>,
        /// Print the new value
        #[arg(long)]
        reveal: bool,
        #[command(flatten)]
        target: Target,
    },

    /// Show retained previous values
    History {
        key: String,
        /// Print values instead of masking them
        #[arg(long)]
        reveal: bool,
        #[command(flatten)]
        target: Target,
    },
}

/// Which backend and namespace a secret command acts on
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Target {
    /// Backend name; defaults to the first configured backend
    #[arg(long, value_name = "NAME")]
    pub backend: Option<String>,

    /// Scope to the active profile instead of the whole project
    #[arg(long)]
    pub profile_scope: bool,
}

impl SecretCommands {
    fn target(&self) -> &Target {
        match self {
            Self::Set { target, .. }
            | Self::Get { target, .. }
            | Self::Delete { target, .. }
            | Self::List { target, .. }
            | Self::Rotate { target, .. }
            | Self::History { target, .. } => target,
        }
    }
}

/// Handle secret commands
pub async fn handle_secret_command(command: SecretCommands, ctx: &ProjectContext) -> Result<()> {
    let mut registry = ctx.registry().await?;
    let target = command.target().clone();
    let (backend_name, backend) =
        ctx.scoped_backend(&registry, target.backend.as_deref(), target.profile_scope)?;

    let span = crate::secret_span!("cli", backend_name, namespace = %backend.prefix());
    let outcome = run(command, ctx, &backend_name, &backend).instrument(span).await;

    registry.close()?;
    outcome
}

async fn run(
    command: SecretCommands,
    ctx: &ProjectContext,
    backend_name: &str,
    backend: &dyn SecretBackend,
) -> Result<()> {
    match command {
        SecretCommands::Set { key, value, .. } => {
            let value = match value {
                Some(value) => value,
                None => StdinPrompt
                    .prompt_secret(&format!("Value for {}", key))
                    .context("Failed to read secret value")?
                    .expose_secret()
                    .to_string(),
            };
            backend
                .set(&key, &value)
                .await
                .with_context(|| format!("Failed to store '{}' in backend '{}'", key, backend_name))?;
            report_success(format!("Stored {} in {}", key, backend_name));
        }

        SecretCommands::Get { key, .. } => {
            let value = backend
                .get(&key)
                .await
                .with_context(|| format!("Failed to read '{}' from backend '{}'", key, backend_name))?;
            println!("{}", value);
        }

        SecretCommands::Delete { key, .. } => {
            backend
                .delete(&key)
                .await
                .with_context(|| format!("Failed to delete '{}' from backend '{}'", key, backend_name))?;
            report_success(format!("Deleted {} from {}", key, backend_name));
        }

        SecretCommands::List { output, .. } => {
            let keys = backend
                .list()
                .await
                .with_context(|| format!("Failed to list backend '{}'", backend_name))?;
            if output == "json" {
                print_json(&keys)?;
            } else if keys.is_empty() {
                println!("No secrets found");
            } else {
                for key in keys {
                    println!("{}", key);
                }
            }
        }

        SecretCommands::Rotate { key, value, length, keep, reveal, .. } => {
            let new_value = value.unwrap_or_else(|| generate_secret(length));
            let keep = keep.unwrap_or(ctx.config.history_keep);
            let outcome = rotate(backend, &key, &new_value, keep).await?;

            report_success(format!(
                "Rotated {} in {}{}",
                key,
                backend_name,
                if outcome.archived { " (previous value archived)" } else { "" }
            ));
            if reveal {
                println!("{}", new_value);
            }
        }

        SecretCommands::History { key, reveal, .. } => {
            let entries = history(backend, &key).await?;
            if entries.is_empty() {
                println!("No history for {}", key);
            }
            for entry in entries {
                let value = if reveal { entry.value.as_str() } else { MASK };
                println!("{:>3}  {}", entry.slot, value);
            }
        }
    }
    Ok(())
}
