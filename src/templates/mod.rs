//! Ready-made agent templates.

pub mod basic_agent;

pub use basic_agent::{AgentDeps, BasicAgentTemplate};
