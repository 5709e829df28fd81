//! # agent-builder
//!
//! Building blocks for LLM agents that call tools:
//!
//! - [`mcp`] - a registry of capability servers (MCP servers launched as
//!   child processes), with config files and source generation
//! - [`templates`] - a ready-made agent with placeholder tools
//! - [`tools`] - the tool abstraction and HTML scraping tools
//! - [`agent`] and [`llms`] - a small agent host with an OpenAI backend

pub mod agent;
pub mod cli;
pub mod llms;
pub mod mcp;
pub mod templates;
pub mod tools;
pub mod utilities;

// Re-exports
pub use agent::{Agent, AgentError, AgentRunResult, RunContext};
pub use llms::base_llm::BaseLLM;
pub use mcp::{CapabilityConfig, CapabilityRegistry, McpError};
pub use templates::{AgentDeps, BasicAgentTemplate};
pub use tools::WebScrapingTools;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
