//! LLM backends used by agents.
//!
//! - [`base_llm`] - The trait every backend implements
//! - [`providers`] - Concrete HTTP providers

pub mod base_llm;
pub mod providers;

// Re-exports for convenience
pub use base_llm::{BaseLLM, BaseLLMState, LLMMessage};
