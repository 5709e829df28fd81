//! Capability servers for agents.
//!
//! A capability is an external tool server (an MCP server) launched as a
//! child process and spoken to over its standard streams. This module
//! provides:
//!
//! - [`config`] - launch configurations and the built-in server table
//! - [`registry`] - name resolution, handle creation and agent attachment
//! - [`transports`] - the stdio transport behind each handle
//! - [`codegen`] - source generation for agents wired to servers
//!
//! The MCP request/response protocol itself is not implemented: transports
//! move newline-delimited JSON and nothing more.

pub mod codegen;
pub mod config;
pub mod error;
pub mod registry;
pub mod transports;

// Re-export main types.
pub use config::{default_mcp_configs, CapabilityConfig};
pub use error::McpError;
pub use registry::{AttachReport, CapabilityRegistry, ToolDescriptor, TransportHandle};
pub use transports::{BaseTransport, StdioTransport};
