//! `ref://backend/path` secret references.

use std::fmt;
use std::str::FromStr;

/// Literal prefix that marks a value as a secret reference.
pub const REF_PREFIX: &str = "ref://";

/// A parsed reference: which backend to ask, and for what key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefUri {
    pub backend: String,
    pub path: String,
}

/// Why a reference could not be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RefParseError {
    #[error("reference must start with 'ref://'")]
    MissingPrefix,

    #[error("reference must have the form ref://<backend>/<path>")]
    MissingSeparator,

    #[error("reference has an empty backend name")]
    EmptyBackend,

    #[error("reference has an empty path")]
    EmptyPath,
}

impl RefUri {
    /// Parse `ref://<backend>/<path>`. The remainder after the prefix is
    /// split on the first `/`; both halves must be non-empty. The path may
    /// itself contain `/`.
    pub fn parse(uri: &str) -> Result<Self, RefParseError> {
        let rest = uri.strip_prefix(REF_PREFIX).ok_or(RefParseError::MissingPrefix)?;
        let (backend, path) = rest.split_once('/').ok_or(RefParseError::MissingSeparator)?;
        if backend.is_empty() {
            return Err(RefParseError::EmptyBackend);
        }
        if path.is_empty() {
            return Err(RefParseError::EmptyPath);
        }
        Ok(Self { backend: backend.to_string(), path: path.to_string() })
    }
}

impl FromStr for RefUri {
    type Err = RefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RefUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", REF_PREFIX, self.backend, self.path)
    }
}

/// Whether `value` is a reference by the prefix rule.
pub fn is_ref(value: &str) -> bool {
    value.starts_with(REF_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let uri = RefUri::parse("ref://keychain/api_key").unwrap();
        assert_eq!(uri.backend, "keychain");
        assert_eq!(uri.path, "api_key");
    }

    #[test]
    fn test_path_keeps_nested_segments() {
        let uri: RefUri = "ref://vault/db/prod/password".parse().unwrap();
        assert_eq!(uri.backend, "vault");
        assert_eq!(uri.path, "db/prod/password");
        assert_eq!(uri.to_string(), "ref://vault/db/prod/password");
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(RefUri::parse("vault/db"), Err(RefParseError::MissingPrefix));
        assert_eq!(RefUri::parse("REF://vault/db"), Err(RefParseError::MissingPrefix));
        assert_eq!(RefUri::parse("ref://vault"), Err(RefParseError::MissingSeparator));
        assert_eq!(RefUri::parse("ref:///db"), Err(RefParseError::EmptyBackend));
        assert_eq!(RefUri::parse("ref://vault/"), Err(RefParseError::EmptyPath));
        assert_eq!(RefUri::parse("ref://"), Err(RefParseError::MissingSeparator));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RefParseError::MissingSeparator.to_string(),
            "reference must have the form ref://<backend>/<path>"
        );
    }

    #[test]
    fn test_is_ref() {
        assert!(is_ref("ref://a/b"));
        assert!(!is_ref(" ref://a/b"));
    }
}
