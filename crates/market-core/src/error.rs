//! Error types for the market core

use thiserror::Error;

/// Failure of a remote call across the transport boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Coordinator unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Order invariants violated
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum OrderError {
    #[error("Order quantity must be positive")]
    ZeroQuantity,

    #[error("Order price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("Order symbol is empty")]
    EmptySymbol,
}

/// Configuration loading or validation failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
