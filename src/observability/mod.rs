//! # Observability
//!
//! Structured logging for the library and CLI. All output goes to stderr so
//! that stdout stays reserved for resolved values.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
