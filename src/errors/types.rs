//! # Error Types
//!
//! Crate-level error type for the resolution engine using `thiserror`.
//! Per-key resolution failures are not errors at this level; they are
//! collected in [`crate::resolve::ResolveResult`] instead.

use std::path::Path;

use crate::secrets::SecretsError;

/// Custom result type for envref operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for envref
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Project configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Fatal env file parse errors (empty key, unterminated quote)
    #[error("Parse error at {location}: {message}")]
    Parse { location: String, message: String },

    /// Secret backend errors that abort the whole command
    #[error("Secret backend error: {context}")]
    Secrets {
        #[source]
        source: SecretsError,
        context: String,
    },

    /// Strict mode violation: one or more references did not resolve
    #[error("strict mode: {count} reference(s) failed to resolve: {}", .keys.join(", "))]
    Strict { count: usize, keys: Vec<String> },

    /// Rotation aborted part way through
    #[error("Rotation failed for '{key}': {source}")]
    Rotation {
        key: String,
        #[source]
        source: SecretsError,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create an I/O error naming the file involved
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create a parse error for `line` of `path` (path is omitted for in-memory input)
    pub fn parse<S: Into<String>>(path: Option<&Path>, line: usize, message: S) -> Self {
        let location = match path {
            Some(path) => format!("{}:{}", path.display(), line),
            None => format!("line {}", line),
        };
        Self::Parse { location, message: message.into() }
    }

    /// Create a secrets error with context
    pub fn secrets<S: Into<String>>(source: SecretsError, context: S) -> Self {
        Self::Secrets { source, context: context.into() }
    }

    /// Create a strict mode summary error from the failing keys
    pub fn strict(keys: Vec<String>) -> Self {
        Self::Strict { count: keys.len(), keys }
    }

    /// Create a rotation error
    pub fn rotation<K: Into<String>>(key: K, source: SecretsError) -> Self {
        Self::Rotation { key: key.into(), source }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Whether this is a strict mode violation
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<SecretsError> for Error {
    fn from(error: SecretsError) -> Self {
        Self::Secrets { source: error, context: "Secret backend operation failed".to_string() }
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::config_with_source("Failed to parse configuration", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Invalid configuration: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_creation() {
        let error = Error::config("missing project name");
        assert!(matches!(error, Error::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: missing project name");
    }

    #[test]
    fn test_parse_error_location() {
        let path = PathBuf::from(".env");
        let error = Error::parse(Some(&path), 3, "unterminated double quote");
        assert_eq!(error.to_string(), "Parse error at .env:3: unterminated double quote");

        let error = Error::parse(None, 7, "empty key");
        assert_eq!(error.to_string(), "Parse error at line 7: empty key");
    }

    #[test]
    fn test_strict_error() {
        let error = Error::strict(vec!["DB_PASSWORD".to_string(), "API_KEY".to_string()]);
        assert!(error.is_strict());
        assert_eq!(
            error.to_string(),
            "strict mode: 2 reference(s) failed to resolve: DB_PASSWORD, API_KEY"
        );
    }

    #[test]
    fn test_validation_error() {
        let error = Error::validation_field("duplicate backend name", "backends");
        if let Error::Validation { field, .. } = error {
            assert_eq!(field, Some("backends".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io { .. }));

        let error: Error = SecretsError::not_found("db").into();
        assert!(matches!(error, Error::Secrets { .. }));

        let toml_error = toml::from_str::<toml::Table>("project = ").unwrap_err();
        let error: Error = toml_error.into();
        assert!(matches!(error, Error::Config { .. }));
    }
}
