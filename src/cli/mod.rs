//! # Command Line Interface
//!
//! Loads `envref.toml`, merges the env layers, resolves `ref://` values and
//! manages secrets in the configured backends.

pub mod commands;
pub mod context;
pub mod output;
pub mod prompt;
pub mod secret;
pub mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::observability::{init_logging, LoggingConfig};
use context::{ProjectContext, PROFILE_ENV_VAR};

#[derive(Parser)]
#[command(name = "envref")]
#[command(about = "Layered .env files with secret references resolved from pluggable backends")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to envref.toml (defaults to searching upward from the current directory)
    #[arg(long, global = true, env = "ENVREF_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Active profile; an empty value disables profiles
    #[arg(short, long, global = true, env = PROFILE_ENV_VAR, value_name = "NAME")]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the merged environment with every reference resolved
    #[command(
        after_help = "EXAMPLES:\n    # Export into the current shell\n    eval \"$(envref resolve)\"\n\n    # Fail instead of printing partial output\n    envref resolve --strict --output json"
    )]
    Resolve {
        /// Output format
        #[arg(short, long, default_value = "env", value_parser = ["env", "json", "yaml", "table"])]
        output: String,

        /// Fail if any reference cannot be resolved
        #[arg(long)]
        strict: bool,
    },

    /// Print the resolved value of one key
    Get {
        key: String,
    },

    /// List variables without resolving references
    List {
        /// Output format
        #[arg(short, long, default_value = "table", value_parser = ["env", "json", "yaml", "table"])]
        output: String,

        /// Show reference text instead of masking it
        #[arg(long)]
        show_secrets: bool,
    },

    /// Show project, layer files and backends
    Status {
        /// Output format
        #[arg(short, long, default_value = "table", value_parser = ["json", "yaml", "table"])]
        output: String,
    },

    /// Check configuration, env files and references
    Validate {
        /// Also resolve every reference against its backend
        #[arg(long)]
        check_backends: bool,
    },

    /// Compare the merged environment of two profiles
    #[command(
        after_help = "EXAMPLES:\n    # Base layers against staging\n    envref diff --right staging\n\n    # Two profiles\n    envref diff --left staging --right production"
    )]
    Diff {
        /// Left-hand profile (default: none)
        #[arg(long)]
        left: Option<String>,

        /// Right-hand profile (default: none)
        #[arg(long)]
        right: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table", value_parser = ["json", "yaml", "table"])]
        output: String,

        /// Show reference text instead of masking it
        #[arg(long)]
        show_secrets: bool,
    },

    /// Set a variable in the base env file
    Set {
        key: String,
        value: String,

        /// Write to the local override file instead
        #[arg(long)]
        local: bool,
    },

    /// Secret backend commands
    Secret {
        #[command(subcommand)]
        command: secret::SecretCommands,
    },

    /// Re-resolve whenever an env file or the configuration changes
    Watch {
        /// Output format
        #[arg(short, long, default_value = "env", value_parser = ["env", "json", "yaml", "table"])]
        output: String,

        /// Fail a pass if any reference cannot be resolved
        #[arg(long)]
        strict: bool,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Quiet period before re-resolving, in milliseconds
        #[arg(long, default_value_t = 200)]
        debounce_ms: u64,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    initialise_logging(cli.verbose);

    match cli.command {
        Commands::Watch { output, strict, interval_ms, debounce_ms } => {
            watch::run(watch::WatchOptions {
                config_path: cli.config,
                profile: cli.profile,
                output,
                strict,
                interval: Duration::from_millis(interval_ms.max(1)),
                debounce: Duration::from_millis(debounce_ms),
            })
            .await?
        }
        command => {
            let ctx = ProjectContext::load(cli.config, cli.profile.as_deref())?;
            handle_project_command(command, &ctx).await?
        }
    }

    Ok(())
}

async fn handle_project_command(command: Commands, ctx: &ProjectContext) -> anyhow::Result<()> {
    match command {
        Commands::Resolve { output, strict } => commands::resolve(ctx, &output, strict).await?,
        Commands::Get { key } => commands::get(ctx, &key).await?,
        Commands::List { output, show_secrets } => commands::list(ctx, &output, show_secrets)?,
        Commands::Status { output } => commands::status(ctx, &output)?,
        Commands::Validate { check_backends } => commands::validate(ctx, check_backends).await?,
        Commands::Diff { left, right, output, show_secrets } => {
            commands::diff(ctx, left.as_deref(), right.as_deref(), &output, show_secrets)?
        }
        Commands::Set { key, value, local } => commands::set(ctx, &key, &value, local)?,
        Commands::Secret { command } => secret::handle_secret_command(command, ctx).await?,
        Commands::Watch { .. } => anyhow::bail!("watch manages its own project context"),
    }
    Ok(())
}

fn initialise_logging(verbose: bool) {
    // Already initialised elsewhere (e.g. integration tests) is fine.
    let _ = init_logging(&LoggingConfig::from_env(verbose));
}
