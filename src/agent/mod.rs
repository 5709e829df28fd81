//! Agent host.
//!
//! The `Agent` type holds a system prompt, an LLM backend, its tools and
//! the capability servers attached to it, and runs a bounded tool-calling
//! loop against the backend.

pub mod core;
pub mod error;
pub mod run_context;

// Re-export the main Agent types.
pub use self::core::{Agent, AgentRunResult, DEFAULT_MAX_ITER};
pub use self::error::AgentError;
pub use self::run_context::RunContext;
