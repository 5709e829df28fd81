//! Transport layer for capability server connections.
//!
//! Capability servers run as local child processes and exchange
//! newline-delimited JSON messages over stdin/stdout. The request/response
//! protocol spoken on top of those lines belongs to the server and is not
//! interpreted here.

pub mod stdio;

use async_trait::async_trait;
use serde_json::Value;

pub use stdio::StdioTransport;

// ---------------------------------------------------------------------------
// BaseTransport
// ---------------------------------------------------------------------------

/// Interface shared by capability transports.
///
/// Methods take `&self` so one transport can be shared between the
/// registry's handle cache and every agent it was attached to.
#[async_trait]
pub trait BaseTransport: Send + Sync {
    /// Whether the underlying process is running and its streams are open.
    fn connected(&self) -> bool;

    /// Start the server process. No-op when already connected.
    ///
    /// # Errors
    ///
    /// Process spawn failures (missing binary, permission errors, etc.).
    async fn connect(&self) -> Result<(), anyhow::Error>;

    /// Stop the server process. No-op when not connected.
    async fn disconnect(&self) -> Result<(), anyhow::Error>;

    /// Write one JSON message followed by a newline.
    async fn send_message(&self, message: &Value) -> Result<(), anyhow::Error>;

    /// Read the next non-empty line and parse it as JSON.
    async fn receive_message(&self) -> Result<Value, anyhow::Error>;

    /// String identifier used for caching and logging:
    /// `"stdio:{command}:{arg1}:{arg2}:..."`.
    fn server_identifier(&self) -> String;
}
