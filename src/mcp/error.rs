//! Capability registry errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the capability registry and its configuration helpers.
///
/// These are surfaced to deterministic setup code. Operations that feed
/// results back to an agent at inference time never return them.
#[derive(Debug, Error)]
pub enum McpError {
    /// The name is neither a built-in nor a loaded user capability.
    #[error("Unknown server: {0}")]
    UnknownCapability(String),

    /// The requested configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// A transport could not be built from the resolved configuration.
    #[error("Failed to create transport for '{name}': {reason}")]
    TransportConstruction { name: String, reason: String },

    /// A value that must be emitted as an identifier is not one.
    #[error("Invalid identifier for generated code: '{0}'")]
    InvalidIdentifier(String),

    /// Template parsing or rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
