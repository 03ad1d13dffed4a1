//! Error types for secret backend operations.

use thiserror::Error;

/// Result type for secret backend operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur while talking to a secret backend.
///
/// `NotFound` is distinguished from every other variant: the resolver treats
/// it as "try the next scope", anything else is a backend fault.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Secret not found in the backend.
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// Failed to connect to the secrets backend.
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Authentication with the secrets backend failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Invalid secret key format.
    #[error("Invalid secret key: {key} - {reason}")]
    InvalidKey { key: String, reason: String },

    /// The backend does not support writes.
    #[error("Backend '{backend}' is read-only: cannot {operation}")]
    ReadOnly { backend: String, operation: String },

    /// Backend-specific error.
    #[error("Backend error: {message}")]
    BackendError { message: String },

    /// Backend declaration error (unknown type, missing option, duplicate name).
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SecretsError {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into(), reason: reason.into() }
    }

    /// Create a read-only error.
    pub fn read_only(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ReadOnly { backend: backend.into(), operation: operation.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    /// Whether the error means "absent" rather than a backend fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = SecretsError::not_found("myapp/DB_PASSWORD");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Secret not found: myapp/DB_PASSWORD");

        let err = SecretsError::connection_failed("timeout");
        assert!(matches!(err, SecretsError::ConnectionFailed { .. }));
        assert!(!err.is_not_found());

        let err = SecretsError::invalid_key("", "key cannot be empty");
        assert!(matches!(err, SecretsError::InvalidKey { .. }));
    }

    #[test]
    fn test_read_only_display() {
        let err = SecretsError::read_only("env", "set secrets");
        assert_eq!(err.to_string(), "Backend 'env' is read-only: cannot set secrets");
    }
}
