//! Error types for the shell policy layer.
//!
//! The policy functions themselves never fail. Errors only arise while
//! loading configuration or while running the proxy host.

use thiserror::Error;

/// Main error type for the shell policy layer.
#[derive(Error, Debug)]
pub enum ShellPolicyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for header '{header}': {reason}")]
    InvalidHeaderValue { header: String, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, ShellPolicyError>;
