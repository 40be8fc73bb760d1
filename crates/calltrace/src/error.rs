//! Error types for call tracing.
//!
//! Recording into a trace never fails. Errors only surface at the
//! boundaries: deriving an identity from an absent object, parsing a
//! status name, and loading configuration.

use thiserror::Error;

/// Result type alias for tracing operations.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that can occur at the edges of the tracing API.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A caller passed an argument the operation cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration is present but unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
