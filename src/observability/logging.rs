//! # Structured Logging
//!
//! Sets up the `tracing` subscriber and provides span macros for resolution
//! passes. Secret values are never recorded; only keys, backend names and
//! counts.

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log output format
pub const LOG_FORMAT_ENV_VAR: &str = "ENVREF_LOG_FORMAT";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// Logging settings resolved from flags and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { default_level: "warn".to_string(), format: LogFormat::Text }
    }
}

impl LoggingConfig {
    /// Build from `ENVREF_LOG_FORMAT`; `verbose` raises the default level to `debug`.
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var(LOG_FORMAT_ENV_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let default_level = if verbose { "debug" } else { "warn" }.to_string();
        Self { default_level, format }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

/// Install the global subscriber. Returns `false` if one was already set
/// (for example by a test harness).
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.is_ok()
}

/// Create a tracing span covering one resolution pass.
///
/// ```rust,ignore
/// let span = resolve_span!("myapp");
/// let span = resolve_span!("myapp", profile = "staging");
/// ```
#[macro_export]
macro_rules! resolve_span {
    ($project:expr) => {
        tracing::info_span!(
            "resolve",
            project = %$project,
            profile = tracing::field::Empty
        )
    };
    ($project:expr, profile = $profile:expr) => {
        tracing::info_span!(
            "resolve",
            project = %$project,
            profile = %$profile
        )
    };
}

/// Create a tracing span for a secret lifecycle operation.
#[macro_export]
macro_rules! secret_span {
    ($operation:expr, $backend:expr) => {
        tracing::debug_span!("secret_operation", operation = %$operation, backend = %$backend)
    };
    ($operation:expr, $backend:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            backend = %$backend,
            $($field)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = resolve_span!("myapp");
        let _span = resolve_span!("myapp", profile = "staging");
        let _span = secret_span!("rotate", "vault");
        let _span = secret_span!("rotate", "vault", key = "API_KEY");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_verbose_raises_default_level() {
        assert_eq!(LoggingConfig::from_env(true).default_level, "debug");
        assert_eq!(LoggingConfig::from_env(false).default_level, "warn");
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
