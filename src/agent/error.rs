//! Agent run errors.

use thiserror::Error;

use crate::tools::ToolError;

/// Errors that end an agent run or a direct tool call.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The LLM backend failed.
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// No tool with this name is registered.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A directly called tool failed.
    #[error("Tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },

    /// The model kept asking for tools past the iteration limit.
    #[error("Maximum iterations exceeded: {0}")]
    MaxIterationsExceeded(usize),
}
