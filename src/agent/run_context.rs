//! Per-call context handed to tools.

use std::fmt;
use std::sync::Arc;

/// Context a tool receives on every call.
pub struct RunContext<D> {
    /// Dependencies the agent was run with.
    pub deps: Arc<D>,
    /// Model driving the run.
    pub model: String,
    /// Id of the tool call being answered, if the model issued one.
    pub tool_call_id: Option<String>,
}

impl<D> RunContext<D> {
    pub fn new(deps: Arc<D>, model: impl Into<String>, tool_call_id: Option<String>) -> Self {
        Self {
            deps,
            model: model.into(),
            tool_call_id,
        }
    }
}

// Manual impl: `D` itself need not be `Clone`.
impl<D> Clone for RunContext<D> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
            model: self.model.clone(),
            tool_call_id: self.tool_call_id.clone(),
        }
    }
}

impl<D> fmt::Debug for RunContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("model", &self.model)
            .field("tool_call_id", &self.tool_call_id)
            .finish()
    }
}
