//! # Error Handling
//!
//! Error types for envref. Fatal load and configuration failures use
//! [`Error`]; per-key resolution failures are collected by the resolver and
//! backend failures carry a [`crate::secrets::SecretsError`].

pub mod types;

pub use types::{Error, Result};
